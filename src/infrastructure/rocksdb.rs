use crate::domain::notification::Notification;
use crate::domain::payment::Payment;
use crate::domain::ports::{NotificationStore, PaymentStore, Refund, RefundStore};
use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family for payment states.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for gateway notifications.
pub const CF_NOTIFICATIONS: &str = "notifications";
/// Column Family for refund records.
pub const CF_REFUNDS: &str = "refunds";

/// A persistent store implementation using RocksDB.
///
/// One database serves all three ports, with a Column Family per entity.
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path,
    /// ensuring the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_NOTIFICATIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_REFUNDS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            ReconcileError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn put_json<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(cf, key, bytes)?;
        Ok(())
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_json<T: serde::de::DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, bytes) = item?;
            values.push(serde_json::from_slice(&bytes)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl PaymentStore for RocksDbStore {
    async fn store(&self, payment: Payment) -> Result<()> {
        self.put_json(CF_PAYMENTS, &payment.id.to_be_bytes(), &payment)
    }

    async fn get(&self, payment_id: u64) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, &payment_id.to_be_bytes())
    }

    async fn find_by_reference(&self, merchant_reference: &str) -> Result<Option<Payment>> {
        let payments: Vec<Payment> = self.scan_json(CF_PAYMENTS)?;
        Ok(payments.into_iter().find(|p| {
            p.source
                .as_ref()
                .is_some_and(|s| s.merchant_reference == merchant_reference)
        }))
    }

    async fn get_all(&self) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self.scan_json(CF_PAYMENTS)?;
        payments.sort_by_key(|p| p.id);
        Ok(payments)
    }
}

#[async_trait]
impl NotificationStore for RocksDbStore {
    async fn store(&self, notification: Notification) -> Result<()> {
        self.put_json(
            CF_NOTIFICATIONS,
            notification.storage_key().as_bytes(),
            &notification,
        )
    }

    async fn unprocessed(&self, merchant_reference: &str) -> Result<Vec<Notification>> {
        let mut selected: Vec<Notification> = self
            .scan_json::<Notification>(CF_NOTIFICATIONS)?
            .into_iter()
            .filter(|n| !n.processed && n.merchant_reference == merchant_reference)
            .collect();
        selected.sort_by_key(|n| n.dispatched_at);
        Ok(selected)
    }

    async fn processed(&self, merchant_reference: &str) -> Result<Vec<Notification>> {
        let mut selected: Vec<Notification> = self
            .scan_json::<Notification>(CF_NOTIFICATIONS)?
            .into_iter()
            .filter(|n| n.processed && n.merchant_reference == merchant_reference)
            .collect();
        selected.sort_by_key(|n| n.dispatched_at);
        Ok(selected)
    }

    async fn outstanding(&self) -> Result<Vec<Notification>> {
        let mut selected: Vec<Notification> = self
            .scan_json::<Notification>(CF_NOTIFICATIONS)?
            .into_iter()
            .filter(|n| !n.processed)
            .collect();
        selected.sort_by_key(|n| n.dispatched_at);
        Ok(selected)
    }
}

#[async_trait]
impl RefundStore for RocksDbStore {
    async fn create(&self, refund: Refund) -> Result<()> {
        // One refund per gateway transaction id.
        self.put_json(CF_REFUNDS, refund.transaction_id.as_bytes(), &refund)
    }

    async fn for_payment(&self, payment_id: u64) -> Result<Vec<Refund>> {
        let refunds: Vec<Refund> = self.scan_json(CF_REFUNDS)?;
        Ok(refunds
            .into_iter()
            .filter(|r| r.payment_id == payment_id)
            .collect())
    }
}
