use std::sync::Arc;

use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::*;
use crate::store::Store;

/// Records when notifications become due. Delivery is someone else's job.
#[derive(Clone)]
pub struct NotificationScheduler {
    store: Arc<dyn Store>,
}

impl NotificationScheduler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn schedule(&self, payload: NotificationPayload, fire_at: Ms) -> Result<Ulid, EngineError> {
        let notification = ScheduledNotification {
            id: Ulid::new(),
            payload,
            fire_at,
            delivered: false,
        };
        self.store.save_notification(&notification).await?;
        tracing::debug!(
            "scheduled {} for user {} at {fire_at}",
            notification.payload.kind(),
            notification.payload.recipient()
        );
        Ok(notification.id)
    }

    /// Undelivered notifications with `fire_at <= now`, oldest first.
    pub async fn due_as_of(&self, now: Ms) -> Result<Vec<ScheduledNotification>, EngineError> {
        self.store.due_notifications(now).await
    }

    pub async fn pending(&self) -> Result<Vec<ScheduledNotification>, EngineError> {
        self.store.pending_notifications().await
    }

    pub async fn mark_delivered(&self, id: Ulid) -> Result<(), EngineError> {
        self.store.mark_delivered(id).await
    }

    /// Forget the reservation's undelivered notifications (e.g. after cancellation).
    pub async fn discard_pending(&self, reservation_id: Ulid) -> Result<(), EngineError> {
        self.store.discard_pending(reservation_id).await
    }
}
