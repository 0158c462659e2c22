use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use accordo::config::Config;
use accordo::dispatcher::{self, Delivery, DeliveryError};
use accordo::engine::Engine;
use accordo::ledger::MemoryLedger;
use accordo::model::ScheduledNotification;
use accordo::store::WalStore;

/// Writes due notifications to the log as JSON.
struct LogDelivery;

#[async_trait]
impl Delivery for LogDelivery {
    async fn deliver(&self, notification: &ScheduledNotification) -> Result<(), DeliveryError> {
        let payload = serde_json::to_string(&notification.payload)?;
        info!(
            "notify user {} ({}): {payload}",
            notification.payload.recipient(),
            notification.payload.kind()
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    accordo::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;
    let wal_path = config.data_dir.join("accordo.wal");
    let store = Arc::new(WalStore::open(&wal_path)?);
    let ledger = Arc::new(MemoryLedger::new());
    let engine = Arc::new(Engine::new(store.clone(), ledger, config.engine));

    info!("accordo started");
    info!("  wal: {}", wal_path.display());
    info!("  policy: {:?}", config.engine.policy);
    info!("  dispatch interval: {}ms", config.dispatch_interval_ms);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let dispatch = tokio::spawn(dispatcher::run_dispatcher(
        engine.scheduler().clone(),
        Arc::new(LogDelivery),
        Duration::from_millis(config.dispatch_interval_ms.max(1)),
    ));
    let compact = tokio::spawn(dispatcher::run_compactor(
        store,
        config.compact_threshold,
        Duration::from_secs(30),
    ));

    // Graceful shutdown on SIGTERM/ctrl-c
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    info!("shutdown signal received");
    dispatch.abort();
    compact.abort();

    info!("accordo stopped");
    Ok(())
}
