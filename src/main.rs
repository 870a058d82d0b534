use clap::Parser;
use hpp_recon::application::engine::{EngineConfig, ReconcileEngine};
use hpp_recon::domain::payment::Payment;
use hpp_recon::domain::ports::{
    NotificationStoreBox, PaymentStoreBox, RefundReasonId, RefundStoreBox,
};
use hpp_recon::infrastructure::in_memory::{
    InMemoryNotificationStore, InMemoryPaymentStore, InMemoryRefundStore,
};
#[cfg(feature = "storage-rocksdb")]
use hpp_recon::infrastructure::rocksdb::RocksDbStore;
use hpp_recon::interfaces::csv::payment_writer::PaymentWriter;
use hpp_recon::interfaces::json::notification_reader::NotificationReader;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Local payments to reconcile, as a JSON array
    payments: PathBuf,

    /// Gateway notifications, one JSON object per line
    notifications: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Refund reason id recorded on gateway-initiated refunds
    #[arg(long, default_value_t = 1)]
    refund_reason: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let (payment_store, notification_store, refund_store): (
        PaymentStoreBox,
        NotificationStoreBox,
        RefundStoreBox,
    ) = match cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            let store = RocksDbStore::open(db_path).into_diagnostic()?;
            (
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store),
            )
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            return Err(miette::miette!(
                "built without the storage-rocksdb feature; --db-path is unavailable"
            ));
        }
        None => (
            Box::new(InMemoryPaymentStore::new()),
            Box::new(InMemoryNotificationStore::new()),
            Box::new(InMemoryRefundStore::new()),
        ),
    };

    // Seed the local payments awaiting reconciliation. Payments already
    // known to a persistent store keep their recovered state.
    let file = File::open(cli.payments).into_diagnostic()?;
    let payments: Vec<Payment> = serde_json::from_reader(file).into_diagnostic()?;
    let payment_ids: Vec<u64> = payments.iter().map(|p| p.id).collect();
    for payment in payments {
        if payment_store
            .get(payment.id)
            .await
            .into_diagnostic()?
            .is_none()
        {
            payment_store.store(payment).await.into_diagnostic()?;
        }
    }

    let engine = ReconcileEngine::new(
        payment_store,
        notification_store,
        refund_store,
        EngineConfig {
            refund_reason: RefundReasonId(cli.refund_reason),
        },
    );

    // Webhook path: persist each incoming notification, then try to
    // reconcile it right away against its payment.
    let file = File::open(cli.notifications).into_diagnostic()?;
    let reader = NotificationReader::new(file);
    for item in reader.notifications() {
        match item {
            Ok(notification) => {
                engine
                    .record(notification.clone())
                    .await
                    .into_diagnostic()?;
                let payment = engine
                    .find_payment(&notification.merchant_reference)
                    .await
                    .into_diagnostic()?;
                if let Err(e) = engine.reconcile(notification, payment.as_ref()).await {
                    eprintln!("Error reconciling notification: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading notification: {}", e);
            }
        }
    }

    // Backlog path: bring every payment up to date in dispatch order.
    for payment_id in payment_ids {
        if let Err(e) = engine.process_outstanding(payment_id).await {
            eprintln!("Error replaying backlog for payment {}: {}", payment_id, e);
        }
    }

    let outstanding = engine.outstanding().await.into_diagnostic()?;
    if !outstanding.is_empty() {
        warn!(count = outstanding.len(), "notifications left unprocessed");
    }

    // Output final state
    let payments = engine.into_results().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = PaymentWriter::new(stdout.lock());
    writer.write_payments(payments).into_diagnostic()?;

    Ok(())
}
