use crate::domain::money::Money;
use crate::domain::notification::{EventKind, Notification};
use crate::domain::payment::Payment;
use crate::domain::ports::{
    NotificationStoreBox, PaymentStoreBox, Refund, RefundReasonId, RefundStoreBox,
};
use crate::domain::source::{HppSource, PaymentSource};
use crate::error::{ReconcileError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Required engine configuration.
pub struct EngineConfig {
    /// Reason recorded on gateway-initiated refunds.
    pub refund_reason: RefundReasonId,
}

/// Effects staged by the classification pass, committed together or not
/// at all.
struct Applied {
    processed: bool,
    refund: Option<Refund>,
}

impl Applied {
    fn processed() -> Self {
        Self {
            processed: true,
            refund: None,
        }
    }

    fn unprocessed() -> Self {
        Self {
            processed: false,
            refund: None,
        }
    }

    fn with_refund(refund: Refund) -> Self {
        Self {
            processed: true,
            refund: Some(refund),
        }
    }
}

/// The notification reconciliation engine.
///
/// `ReconcileEngine` converges a local payment with the gateway's
/// asynchronous event reports. It owns the storage backends and
/// serialises all work per payment: a per-payment async lock guarantees
/// at most one in-flight reconciliation or backlog sweep for any payment.
pub struct ReconcileEngine {
    payments: PaymentStoreBox,
    notifications: NotificationStoreBox,
    refunds: RefundStoreBox,
    config: EngineConfig,
    locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl ReconcileEngine {
    pub fn new(
        payments: PaymentStoreBox,
        notifications: NotificationStoreBox,
        refunds: RefundStoreBox,
        config: EngineConfig,
    ) -> Self {
        Self {
            payments,
            notifications,
            refunds,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Persists an incoming notification, unprocessed. This is the
    /// intake side of the webhook flow; reconciliation happens separately
    /// via [`reconcile`](Self::reconcile) or a backlog sweep.
    pub async fn record(&self, notification: Notification) -> Result<()> {
        self.notifications.store(notification).await
    }

    /// Correlates a notification's merchant reference to a local payment.
    pub async fn find_payment(&self, merchant_reference: &str) -> Result<Option<Payment>> {
        self.payments.find_by_reference(merchant_reference).await
    }

    /// Reconciles one notification against one payment.
    ///
    /// With no matching payment (test pings, reports for foreign
    /// references) the notification is returned untouched and logged for
    /// audit; that is not an error. Otherwise the notification is
    /// classified and exactly the corresponding payment mutations are
    /// applied. All effects of one call commit together: on any
    /// transition failure nothing is persisted, `processed` stays false
    /// and the error surfaces to the caller so the notification is
    /// retried later.
    ///
    /// Callers must not hand in already-processed notifications;
    /// redelivery filtering happens on the `processed` flag upstream.
    pub async fn reconcile(
        &self,
        notification: Notification,
        payment: Option<&Payment>,
    ) -> Result<Notification> {
        let Some(payment) = payment else {
            warn!(
                psp_reference = %notification.psp_reference,
                merchant_reference = %notification.merchant_reference,
                event_code = notification.event_code.as_str(),
                "no matching payment for notification, leaving unprocessed"
            );
            return Ok(notification);
        };

        let lock = self.payment_lock(payment.id).await;
        let _guard = lock.lock().await;

        // Re-read the committed state under the lock; the caller's copy
        // may predate a concurrent reconciliation.
        let current = self
            .payments
            .get(payment.id)
            .await?
            .ok_or(ReconcileError::UnknownPayment(payment.id))?;
        self.reconcile_locked(notification, &current).await
    }

    /// Replays the payment's unprocessed notifications in dispatch order.
    ///
    /// Each notification commits on its own, so a failure partway keeps
    /// the progress made before it; the failing notification and the rest
    /// of the backlog stay unprocessed for the next sweep. The per-payment
    /// lock is held for the whole sweep.
    pub async fn process_outstanding(&self, payment_id: u64) -> Result<Vec<Notification>> {
        let lock = self.payment_lock(payment_id).await;
        let _guard = lock.lock().await;

        let payment = self
            .payments
            .get(payment_id)
            .await?
            .ok_or(ReconcileError::UnknownPayment(payment_id))?;
        let Some(reference) = payment.source.as_ref().map(|s| s.merchant_reference.clone())
        else {
            return Ok(Vec::new());
        };

        let backlog = self.notifications.unprocessed(&reference).await?;
        let mut results = Vec::with_capacity(backlog.len());
        for notification in backlog {
            // Later events assume the state the earlier ones established,
            // so reload the committed payment between steps.
            let current = self
                .payments
                .get(payment_id)
                .await?
                .ok_or(ReconcileError::UnknownPayment(payment_id))?;
            results.push(self.reconcile_locked(notification, &current).await?);
        }
        Ok(results)
    }

    /// Manually triggerable actions currently available on a source,
    /// namespaced, derived from its last processed authorisation.
    pub async fn available_actions(&self, source: &HppSource) -> Result<Vec<String>> {
        let history = self
            .notifications
            .processed(&source.merchant_reference)
            .await?;
        Ok(source.actions(&history))
    }

    /// All notifications still awaiting reconciliation, any reference.
    pub async fn outstanding(&self) -> Result<Vec<Notification>> {
        self.notifications.outstanding().await
    }

    pub async fn refunds_for(&self, payment_id: u64) -> Result<Vec<Refund>> {
        self.refunds.for_payment(payment_id).await
    }

    /// Consumes the engine and returns the final state of all payments.
    pub async fn into_results(self) -> Result<Vec<Payment>> {
        self.payments.get_all().await
    }

    async fn payment_lock(&self, payment_id: u64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(payment_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn reconcile_locked(
        &self,
        mut notification: Notification,
        payment: &Payment,
    ) -> Result<Notification> {
        // The classification pass runs against a scratch copy; nothing is
        // persisted until every transition has succeeded.
        let mut scratch = payment.clone();
        let staged = self.apply(&notification, &mut scratch)?;

        if !staged.processed {
            debug!(
                psp_reference = %notification.psp_reference,
                event_code = notification.event_code.as_str(),
                "unsupported event kind, left in backlog"
            );
            return Ok(notification);
        }

        if let Some(refund) = staged.refund {
            self.refunds.create(refund).await?;
        }
        notification.processed = true;
        self.notifications.store(notification.clone()).await?;
        self.payments.store(scratch).await?;

        info!(
            payment_id = payment.id,
            psp_reference = %notification.psp_reference,
            event_code = notification.event_code.as_str(),
            success = notification.success,
            "notification reconciled"
        );
        Ok(notification)
    }

    /// Classifies the notification and mutates the scratch payment.
    /// Evaluated in strict order; first match wins.
    fn apply(&self, notification: &Notification, payment: &mut Payment) -> Result<Applied> {
        if !notification.success {
            // A failure report for a completed payment is a stale
            // duplicate; acknowledge it without touching the payment.
            if !payment.is_completed() {
                payment.fail()?;
            }
            return Ok(Applied::processed());
        }

        match notification.kind() {
            EventKind::ModificationCapture => {
                self.complete_payment(notification, payment)?;
                Ok(Applied::processed())
            }
            EventKind::ModificationCancelOrRefund => {
                payment.void()?;
                Ok(Applied::processed())
            }
            EventKind::ModificationRefund => {
                let amount = Money::new(notification.value, &notification.currency)?;
                let refund = Refund {
                    payment_id: payment.id,
                    amount: amount.major(),
                    transaction_id: notification.psp_reference.clone(),
                    reason: self.config.refund_reason,
                };
                // The payment moved to processing pending refund
                // settlement; the settled refund moves it back.
                payment.complete()?;
                Ok(Applied::with_refund(refund))
            }
            EventKind::NormalAuthorisation => {
                if notification.auto_captured() {
                    self.complete_payment(notification, payment)?;
                } else {
                    payment.authorize()?;
                }
                Ok(Applied::processed())
            }
            EventKind::Unknown => Ok(Applied::unprocessed()),
        }
    }

    /// Gateway-driven capture confirmation: record the captured amount,
    /// settle the payment total to it and complete the payment.
    fn complete_payment(&self, notification: &Notification, payment: &mut Payment) -> Result<()> {
        let amount = Money::new(notification.value, &notification.currency)?;
        payment.record_capture_from(amount, &notification.psp_reference)?;
        payment.set_amount_to_captured();
        payment.complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::EventCode;
    use crate::domain::payment::PaymentState;
    use crate::infrastructure::in_memory::{
        InMemoryNotificationStore, InMemoryPaymentStore, InMemoryRefundStore,
    };
    use chrono::{TimeZone, Utc};

    fn engine() -> ReconcileEngine {
        ReconcileEngine::new(
            Box::new(InMemoryPaymentStore::new()),
            Box::new(InMemoryNotificationStore::new()),
            Box::new(InMemoryRefundStore::new()),
            EngineConfig {
                refund_reason: RefundReasonId(1),
            },
        )
    }

    fn notification(event_code: EventCode, success: bool) -> Notification {
        Notification {
            psp_reference: "psp-1".to_string(),
            original_reference: None,
            merchant_reference: "R1".to_string(),
            event_code,
            success,
            value: 1000,
            currency: "USD".to_string(),
            operations: Vec::new(),
            dispatched_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            processed: false,
        }
    }

    fn payment() -> Payment {
        Payment::new(1, 1000, "USD").with_source(HppSource {
            merchant_reference: "R1".to_string(),
            psp_reference: "psp-0".to_string(),
            auth_result: None,
            payment_method: None,
        })
    }

    #[tokio::test]
    async fn test_reconcile_without_payment_is_a_noop() {
        let engine = engine();
        let result = engine
            .reconcile(notification(EventCode::Authorisation, true), None)
            .await
            .unwrap();
        assert!(!result.processed);
    }

    #[tokio::test]
    async fn test_capture_completes_payment() {
        let engine = engine();
        engine.payments.store(payment()).await.unwrap();

        let result = engine
            .reconcile(notification(EventCode::Capture, true), Some(&payment()))
            .await
            .unwrap();

        assert!(result.processed);
        let stored = engine.payments.get(1).await.unwrap().unwrap();
        assert_eq!(stored.state, PaymentState::Completed);
        assert_eq!(stored.captured_minor(), 1000);
        assert_eq!(stored.amount_minor, 1000);
    }

    #[tokio::test]
    async fn test_unknown_event_left_unprocessed() {
        let engine = engine();
        engine.payments.store(payment()).await.unwrap();

        let result = engine
            .reconcile(notification(EventCode::Unsupported, true), Some(&payment()))
            .await
            .unwrap();

        assert!(!result.processed);
        let stored = engine.payments.get(1).await.unwrap().unwrap();
        assert_eq!(stored.state, PaymentState::Pending);
    }

    #[tokio::test]
    async fn test_transition_failure_rolls_back() {
        let engine = engine();
        let mut failed = payment();
        failed.fail().unwrap();
        engine.payments.store(failed).await.unwrap();

        // A refund against a failed payment cannot complete it.
        let result = engine
            .reconcile(notification(EventCode::Refund, true), Some(&payment()))
            .await;
        assert!(matches!(result, Err(ReconcileError::TransitionError(_))));

        // Nothing was persisted: no refund row, payment untouched.
        assert!(engine.refunds.for_payment(1).await.unwrap().is_empty());
        let stored = engine.payments.get(1).await.unwrap().unwrap();
        assert_eq!(stored.state, PaymentState::Failed);
    }
}
