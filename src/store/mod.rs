//! Storage seam. The engine reads and writes only through [`Store`], so the
//! resolver and the conflict checker never see how records are kept.
//!
//! Every write is an [`Event`]; the provided `save_*` helpers build the event and
//! hand it to [`Store::commit`].

mod durable;
mod memory;

pub use durable::WalStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::*;

#[async_trait]
pub trait Store: Send + Sync {
    /// Durably record one mutation and make it visible to subsequent reads.
    async fn commit(&self, event: Event) -> Result<(), EngineError>;

    // ── Reads ────────────────────────────────────────────────

    async fn resource(&self, id: ResourceId) -> Result<Option<Resource>, EngineError>;

    /// All templates of the resource, active or not.
    async fn weekly_templates(&self, resource_id: ResourceId) -> Result<Vec<WeeklyTemplate>, EngineError>;

    async fn weekly_template(&self, id: Ulid) -> Result<Option<WeeklyTemplate>, EngineError>;

    /// Overrides with `from <= date <= to`, sorted by date.
    async fn date_overrides(
        &self,
        resource_id: ResourceId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DateOverride>, EngineError>;

    /// Blackouts that can touch `window`: one-off periods overlapping it and
    /// recurring periods whose first occurrence starts before it ends.
    async fn blackout_periods(
        &self,
        resource_id: ResourceId,
        window: &Span,
    ) -> Result<Vec<BlackoutPeriod>, EngineError>;

    async fn blackout(&self, id: Ulid) -> Result<Option<BlackoutPeriod>, EngineError>;

    async fn reservation(&self, id: Ulid) -> Result<Option<Reservation>, EngineError>;

    /// Reservations on the resource whose status is in `statuses` (all if empty),
    /// sorted by window start.
    async fn reservations_by_resource(
        &self,
        resource_id: ResourceId,
        statuses: &[ReservationStatus],
    ) -> Result<Vec<Reservation>, EngineError>;

    /// Undelivered notifications with `fire_at <= now`, oldest first.
    async fn due_notifications(&self, now: Ms) -> Result<Vec<ScheduledNotification>, EngineError>;

    /// Undelivered notifications regardless of due time, oldest first.
    async fn pending_notifications(&self) -> Result<Vec<ScheduledNotification>, EngineError>;

    /// Goals of the user that are open and not yet linked, in creation order.
    async fn open_goals(&self, user: UserId) -> Result<Vec<Goal>, EngineError>;

    async fn goal(&self, id: Ulid) -> Result<Option<Goal>, EngineError>;

    // ── Writes ───────────────────────────────────────────────

    async fn save_resource(&self, resource: Resource) -> Result<(), EngineError> {
        self.commit(Event::ResourceRegistered {
            id: resource.id,
            owner: resource.owner,
        })
        .await
    }

    async fn save_weekly_template(&self, template: &WeeklyTemplate) -> Result<(), EngineError> {
        self.commit(Event::TemplateSaved {
            template: template.clone(),
        })
        .await
    }

    async fn date_override(
        &self,
        resource_id: ResourceId,
        date: NaiveDate,
    ) -> Result<Option<DateOverride>, EngineError> {
        Ok(self.date_overrides(resource_id, date, date).await?.into_iter().next())
    }

    async fn save_date_override(&self, date_override: &DateOverride) -> Result<(), EngineError> {
        self.commit(Event::OverrideSaved {
            date_override: date_override.clone(),
        })
        .await
    }

    async fn remove_date_override(&self, resource_id: ResourceId, date: NaiveDate) -> Result<(), EngineError> {
        self.commit(Event::OverrideRemoved { resource_id, date }).await
    }

    async fn save_blackout(&self, blackout: &BlackoutPeriod) -> Result<(), EngineError> {
        self.commit(Event::BlackoutSaved {
            blackout: blackout.clone(),
        })
        .await
    }

    async fn remove_blackout(&self, id: Ulid, resource_id: ResourceId) -> Result<(), EngineError> {
        self.commit(Event::BlackoutRemoved { id, resource_id }).await
    }

    async fn save_reservation(&self, reservation: &Reservation) -> Result<(), EngineError> {
        self.commit(Event::ReservationSaved {
            reservation: reservation.clone(),
        })
        .await
    }

    async fn save_notification(&self, notification: &ScheduledNotification) -> Result<(), EngineError> {
        self.commit(Event::NotificationScheduled {
            notification: notification.clone(),
        })
        .await
    }

    async fn mark_delivered(&self, id: Ulid) -> Result<(), EngineError> {
        self.commit(Event::NotificationDelivered { id }).await
    }

    /// Drop every undelivered notification that belongs to the reservation.
    async fn discard_pending(&self, reservation_id: Ulid) -> Result<(), EngineError> {
        self.commit(Event::NotificationsDiscarded { reservation_id }).await
    }

    async fn save_goal(&self, goal: &Goal) -> Result<(), EngineError> {
        self.commit(Event::GoalSaved { goal: goal.clone() }).await
    }

    async fn link_goal(&self, goal_id: Ulid, reservation_id: Ulid) -> Result<(), EngineError> {
        self.commit(Event::GoalLinked {
            goal_id,
            reservation_id,
        })
        .await
    }
}
