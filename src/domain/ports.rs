use crate::domain::notification::Notification;
use crate::domain::payment::Payment;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier of a configured refund reason. Always injected explicitly;
/// there is no implicit default lookup.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct RefundReasonId(pub u32);

/// A gateway-initiated refund recorded against a payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Refund {
    pub payment_id: u64,
    /// Refunded amount in major units.
    pub amount: Decimal,
    /// Gateway transaction id of the refund event.
    pub transaction_id: String,
    pub reason: RefundReasonId,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn store(&self, payment: Payment) -> Result<()>;
    async fn get(&self, payment_id: u64) -> Result<Option<Payment>>;
    /// Looks a payment up by the merchant reference on its source.
    async fn find_by_reference(&self, merchant_reference: &str) -> Result<Option<Payment>>;
    async fn get_all(&self) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Upserts a notification, keyed by `(psp_reference, event_code)`.
    async fn store(&self, notification: Notification) -> Result<()>;
    /// Unprocessed notifications for a merchant reference, ascending
    /// dispatch order. Ordering is part of the contract.
    async fn unprocessed(&self, merchant_reference: &str) -> Result<Vec<Notification>>;
    /// Processed notifications for a merchant reference, ascending
    /// dispatch order.
    async fn processed(&self, merchant_reference: &str) -> Result<Vec<Notification>>;
    /// All unprocessed notifications regardless of reference, for sweep
    /// discovery and audit reporting.
    async fn outstanding(&self) -> Result<Vec<Notification>>;
}

#[async_trait]
pub trait RefundStore: Send + Sync {
    async fn create(&self, refund: Refund) -> Result<()>;
    async fn for_payment(&self, payment_id: u64) -> Result<Vec<Refund>>;
}

pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type NotificationStoreBox = Box<dyn NotificationStore>;
pub type RefundStoreBox = Box<dyn RefundStore>;
