use chrono::{DateTime, TimeZone, Utc};
use hpp_recon::application::engine::{EngineConfig, ReconcileEngine};
use hpp_recon::domain::notification::{EventCode, Notification};
use hpp_recon::domain::payment::Payment;
use hpp_recon::domain::ports::RefundReasonId;
use hpp_recon::domain::source::HppSource;
use hpp_recon::infrastructure::in_memory::{
    InMemoryNotificationStore, InMemoryPaymentStore, InMemoryRefundStore,
};

/// Engine plus shared handles to its in-memory stores, so tests can seed
/// and inspect state directly.
pub struct Harness {
    pub engine: ReconcileEngine,
    pub payments: InMemoryPaymentStore,
    pub notifications: InMemoryNotificationStore,
    pub refunds: InMemoryRefundStore,
}

pub fn harness() -> Harness {
    let payments = InMemoryPaymentStore::new();
    let notifications = InMemoryNotificationStore::new();
    let refunds = InMemoryRefundStore::new();
    let engine = ReconcileEngine::new(
        Box::new(payments.clone()),
        Box::new(notifications.clone()),
        Box::new(refunds.clone()),
        EngineConfig {
            refund_reason: RefundReasonId(1),
        },
    );
    Harness {
        engine,
        payments,
        notifications,
        refunds,
    }
}

pub fn hpp_source(merchant_reference: &str) -> HppSource {
    HppSource {
        merchant_reference: merchant_reference.to_string(),
        psp_reference: "redirect-psp".to_string(),
        auth_result: Some("AUTHORISED".to_string()),
        payment_method: Some("visa".to_string()),
    }
}

pub fn payment(id: u64, amount_minor: i64, merchant_reference: &str) -> Payment {
    Payment::new(id, amount_minor, "USD").with_source(hpp_source(merchant_reference))
}

pub fn dispatched(second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, second).unwrap()
}

pub fn notification(
    psp_reference: &str,
    merchant_reference: &str,
    event_code: EventCode,
    success: bool,
    value: i64,
    second: u32,
) -> Notification {
    Notification {
        psp_reference: psp_reference.to_string(),
        original_reference: None,
        merchant_reference: merchant_reference.to_string(),
        event_code,
        success,
        value,
        currency: "USD".to_string(),
        operations: Vec::new(),
        dispatched_at: dispatched(second),
        processed: false,
    }
}

/// An authorisation that still needs a manual capture.
pub fn manual_auth(
    psp_reference: &str,
    merchant_reference: &str,
    value: i64,
    second: u32,
) -> Notification {
    let mut n = notification(
        psp_reference,
        merchant_reference,
        EventCode::Authorisation,
        true,
        value,
        second,
    );
    n.operations = vec![
        "CAPTURE".to_string(),
        "CANCEL".to_string(),
        "REFUND".to_string(),
    ];
    n
}
