use crate::domain::notification::Notification;
use crate::domain::payment::Payment;
use crate::domain::ports::{NotificationStore, PaymentStore, Refund, RefundStore};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for payments.
///
/// Uses `Arc<RwLock<HashMap<u64, Payment>>>` to allow shared concurrent
/// access. Ideal for testing or small datasets where persistence is not
/// required.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<u64, Payment>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn store(&self, payment: Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.insert(payment.id, payment);
        Ok(())
    }

    async fn get(&self, payment_id: u64) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(&payment_id).cloned())
    }

    async fn find_by_reference(&self, merchant_reference: &str) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .find(|p| {
                p.source
                    .as_ref()
                    .is_some_and(|s| s.merchant_reference == merchant_reference)
            })
            .cloned())
    }

    async fn get_all(&self) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut all: Vec<Payment> = payments.values().cloned().collect();
        all.sort_by_key(|p| p.id);
        Ok(all)
    }
}

/// A thread-safe in-memory store for gateway notifications.
///
/// Keyed by `(psp_reference, event_code)` so redeliveries of the same
/// event overwrite instead of duplicating. Queries return ascending
/// dispatch order regardless of insertion order.
#[derive(Default, Clone)]
pub struct InMemoryNotificationStore {
    notifications: Arc<RwLock<HashMap<String, Notification>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn select(&self, pred: impl Fn(&Notification) -> bool) -> Vec<Notification> {
        let notifications = self.notifications.read().await;
        let mut selected: Vec<Notification> =
            notifications.values().filter(|n| pred(n)).cloned().collect();
        selected.sort_by_key(|n| n.dispatched_at);
        selected
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn store(&self, notification: Notification) -> Result<()> {
        let mut notifications = self.notifications.write().await;
        notifications.insert(notification.storage_key(), notification);
        Ok(())
    }

    async fn unprocessed(&self, merchant_reference: &str) -> Result<Vec<Notification>> {
        Ok(self
            .select(|n| !n.processed && n.merchant_reference == merchant_reference)
            .await)
    }

    async fn processed(&self, merchant_reference: &str) -> Result<Vec<Notification>> {
        Ok(self
            .select(|n| n.processed && n.merchant_reference == merchant_reference)
            .await)
    }

    async fn outstanding(&self) -> Result<Vec<Notification>> {
        Ok(self.select(|n| !n.processed).await)
    }
}

/// A thread-safe in-memory store for refund records.
#[derive(Default, Clone)]
pub struct InMemoryRefundStore {
    refunds: Arc<RwLock<Vec<Refund>>>,
}

impl InMemoryRefundStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefundStore for InMemoryRefundStore {
    async fn create(&self, refund: Refund) -> Result<()> {
        let mut refunds = self.refunds.write().await;
        refunds.push(refund);
        Ok(())
    }

    async fn for_payment(&self, payment_id: u64) -> Result<Vec<Refund>> {
        let refunds = self.refunds.read().await;
        Ok(refunds
            .iter()
            .filter(|r| r.payment_id == payment_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::EventCode;
    use crate::domain::ports::RefundReasonId;
    use crate::domain::source::HppSource;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn notification(psp: &str, second: u32, processed: bool) -> Notification {
        Notification {
            psp_reference: psp.to_string(),
            original_reference: None,
            merchant_reference: "R1".to_string(),
            event_code: EventCode::Authorisation,
            success: true,
            value: 1000,
            currency: "USD".to_string(),
            operations: Vec::new(),
            dispatched_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, second).unwrap(),
            processed,
        }
    }

    #[tokio::test]
    async fn test_payment_store_roundtrip() {
        let store = InMemoryPaymentStore::new();
        let payment = Payment::new(1, 1000, "USD").with_source(HppSource {
            merchant_reference: "R1".to_string(),
            psp_reference: "psp-0".to_string(),
            auth_result: None,
            payment_method: None,
        });

        store.store(payment.clone()).await.unwrap();
        assert_eq!(store.get(1).await.unwrap().unwrap(), payment);
        assert_eq!(
            store.find_by_reference("R1").await.unwrap().unwrap(),
            payment
        );
        assert!(store.find_by_reference("R2").await.unwrap().is_none());
        assert!(store.get(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_notification_queries_sorted_by_dispatch() {
        let store = InMemoryNotificationStore::new();
        // Insert newest first; queries must still come back oldest first.
        store.store(notification("psp-3", 30, false)).await.unwrap();
        store.store(notification("psp-1", 10, false)).await.unwrap();
        store.store(notification("psp-2", 20, false)).await.unwrap();

        let unprocessed = store.unprocessed("R1").await.unwrap();
        let refs: Vec<&str> = unprocessed.iter().map(|n| n.psp_reference.as_str()).collect();
        assert_eq!(refs, vec!["psp-1", "psp-2", "psp-3"]);
    }

    #[tokio::test]
    async fn test_notification_redelivery_overwrites() {
        let store = InMemoryNotificationStore::new();
        store.store(notification("psp-1", 10, false)).await.unwrap();
        store.store(notification("psp-1", 10, true)).await.unwrap();

        assert!(store.unprocessed("R1").await.unwrap().is_empty());
        assert_eq!(store.processed("R1").await.unwrap().len(), 1);
        assert!(store.outstanding().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refund_store() {
        let store = InMemoryRefundStore::new();
        let refund = Refund {
            payment_id: 1,
            amount: dec!(10.50),
            transaction_id: "psp-9".to_string(),
            reason: RefundReasonId(1),
        };

        store.create(refund.clone()).await.unwrap();
        assert_eq!(store.for_payment(1).await.unwrap(), vec![refund]);
        assert!(store.for_payment(2).await.unwrap().is_empty());
    }
}
