use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::engine::{now_ms, EngineError};
use crate::model::{Ms, ScheduledNotification};
use crate::observability;
use crate::scheduler::NotificationScheduler;
use crate::store::WalStore;

pub type DeliveryError = Box<dyn std::error::Error + Send + Sync>;

/// Outbound channel for due notifications (email, push, a log line).
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, notification: &ScheduledNotification) -> Result<(), DeliveryError>;
}

/// Hand every notification due at `now` to `delivery`. Successful ones are
/// marked delivered; failed ones stay pending and are retried next pass.
/// Returns how many were delivered.
pub async fn dispatch_due(
    scheduler: &NotificationScheduler,
    delivery: &dyn Delivery,
    now: Ms,
) -> Result<usize, EngineError> {
    let due = scheduler.due_as_of(now).await?;
    let mut delivered = 0;
    for notification in due {
        let kind = notification.payload.kind();
        match delivery.deliver(&notification).await {
            Ok(()) => {
                scheduler.mark_delivered(notification.id).await?;
                delivered += 1;
                metrics::counter!(
                    observability::NOTIFICATIONS_DISPATCHED_TOTAL,
                    "kind" => kind,
                    "status" => "delivered"
                )
                .increment(1);
            }
            Err(e) => {
                warn!("delivering {kind} {} failed: {e}", notification.id);
                metrics::counter!(
                    observability::NOTIFICATIONS_DISPATCHED_TOTAL,
                    "kind" => kind,
                    "status" => "failed"
                )
                .increment(1);
            }
        }
    }
    Ok(delivered)
}

/// Background task that periodically delivers due notifications.
pub async fn run_dispatcher(scheduler: NotificationScheduler, delivery: Arc<dyn Delivery>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        match dispatch_due(&scheduler, delivery.as_ref(), now_ms()).await {
            Ok(0) => {}
            Ok(n) => debug!("dispatched {n} notifications"),
            Err(e) => warn!("dispatch pass failed: {e}"),
        }
    }
}

/// Background task that rewrites the WAL once enough appends have piled up.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let appends = store.appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match store.compact().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => warn!("WAL compaction failed: {e}"),
        }
    }
}
