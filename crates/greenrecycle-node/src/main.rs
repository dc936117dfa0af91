//! GreenRecycle ledger node.
//!
//! Connects to Postgres, applies the schema, and runs the expiry scheduler
//! until Ctrl-C. Notifications raised by the sweeps are queued on an outbox
//! and written to the `notifications` table off the sweep path.

mod config;

use std::sync::Arc;

use anyhow::Context;
use greenrecycle_ledger::{
    ExpirySweeper, LedgerStore, NotificationOutbox, NotificationSender, PgLedgerStore,
    PgNotificationSender, Scheduler,
};
use greenrecycle_types::constants::{NOTIFICATION_QUEUE_CAPACITY, SERVICE_NAME, VERSION};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{LogFormat, NodeConfig};

const DEFAULT_LOG_FILTER: &str = "info,greenrecycle=debug";

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = NodeConfig::load()?;
    init_tracing(config.log_format);

    tracing::info!("Starting {SERVICE_NAME} node v{VERSION}");
    tracing::debug!(
        max_connections = config.database.max_connections,
        order_expiry_hours = config.ledger.order_sweep.max_age_hours,
        withdrawal_expiry_hours = config.ledger.withdrawal_sweep.max_age_hours,
        "Configuration loaded"
    );

    // 1. Storage
    let store = PgLedgerStore::connect(&config.database.connect_options())
        .await
        .context("connecting to the ledger database")?;
    store.migrate().await.context("applying ledger schema")?;

    // 2. Notifications
    let outbox = Arc::new(NotificationOutbox::spawn(
        Arc::new(PgNotificationSender::new(store.pool().clone())),
        config
            .notification_queue
            .unwrap_or(NOTIFICATION_QUEUE_CAPACITY),
    ));

    // 3. Sweeps
    let store: Arc<dyn LedgerStore> = Arc::new(store);
    let notifier: Arc<dyn NotificationSender> = outbox.clone();
    let sweeper = Arc::new(ExpirySweeper::new(store, notifier, config.ledger.clone()));
    let scheduler = Scheduler::start(sweeper, &config.ledger);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    scheduler.stop().await;
    outbox.shutdown().await;
    tracing::info!("{SERVICE_NAME} node stopped");
    Ok(())
}
