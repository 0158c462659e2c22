use chrono::NaiveDate;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{validate_text, validate_window};
use super::{Engine, EngineError};

fn check_time_range(start: TimeOfDay, end: TimeOfDay) -> Result<(), EngineError> {
    if start >= end {
        return Err(EngineError::InvalidWindow {
            start: start.offset_ms(),
            end: end.offset_ms(),
        });
    }
    Ok(())
}

impl Engine {
    pub async fn register_resource(&self, id: ResourceId, owner: UserId) -> Result<Resource, EngineError> {
        let _guard = self.resource_lock(id).lock_owned().await;
        if self.store.resource(id).await?.is_some() {
            return Err(EngineError::AlreadyExists(id));
        }
        let resource = Resource { id, owner };
        self.store.save_resource(resource).await?;
        info!("resource {id} registered for user {owner}");
        Ok(resource)
    }

    pub async fn add_weekly_template(
        &self,
        actor: UserId,
        resource_id: ResourceId,
        day_of_week: u8,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Result<WeeklyTemplate, EngineError> {
        if day_of_week > 6 {
            return Err(EngineError::LimitExceeded("day of week must be 0 (Sunday) to 6"));
        }
        check_time_range(start, end)?;
        self.require_owner(actor, resource_id, "edit this resource's templates")
            .await?;
        let _guard = self.resource_lock(resource_id).lock_owned().await;
        let templates = self.store.weekly_templates(resource_id).await?;
        let active = templates.iter().filter(|t| t.active);
        if active
            .clone()
            .any(|t| t.day_of_week == day_of_week && t.start < end && start < t.end)
        {
            return Err(EngineError::InvalidWindow {
                start: start.offset_ms(),
                end: end.offset_ms(),
            });
        }
        if active.count() >= MAX_TEMPLATES_PER_RESOURCE {
            return Err(EngineError::LimitExceeded("too many weekly templates"));
        }

        let template = WeeklyTemplate {
            id: Ulid::new(),
            resource_id,
            day_of_week,
            start,
            end,
            active: true,
        };
        self.store.save_weekly_template(&template).await?;
        info!(
            "resource {resource_id}: template {} day {day_of_week} {start}-{end}",
            template.id
        );
        Ok(template)
    }

    /// Templates are never hard-deleted.
    pub async fn deactivate_weekly_template(
        &self,
        actor: UserId,
        template_id: Ulid,
    ) -> Result<WeeklyTemplate, EngineError> {
        let mut template = self
            .store
            .weekly_template(template_id)
            .await?
            .ok_or(EngineError::EntityNotFound(template_id))?;
        self.require_owner(actor, template.resource_id, "edit this resource's templates")
            .await?;
        if template.active {
            template.active = false;
            self.store.save_weekly_template(&template).await?;
            info!("resource {}: template {template_id} deactivated", template.resource_id);
        }
        Ok(template)
    }

    /// Replaces any override already set for `date`.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_date_override(
        &self,
        actor: UserId,
        resource_id: ResourceId,
        date: NaiveDate,
        start: TimeOfDay,
        end: TimeOfDay,
        is_available: bool,
        note: Option<String>,
    ) -> Result<DateOverride, EngineError> {
        if is_available {
            check_time_range(start, end)?;
        }
        validate_text(note.as_deref(), MAX_NOTE_LEN, "override note too long")?;
        let date_start = date_start_ms(date);
        if date_start < MIN_VALID_TIMESTAMP_MS || date_start >= MAX_VALID_TIMESTAMP_MS {
            return Err(EngineError::LimitExceeded("timestamp out of range"));
        }
        self.require_owner(actor, resource_id, "edit this resource's overrides")
            .await?;

        let date_override = DateOverride {
            id: Ulid::new(),
            resource_id,
            date,
            start,
            end,
            is_available,
            note,
        };
        self.store.save_date_override(&date_override).await?;
        if is_available {
            info!("resource {resource_id}: override {date} open {start}-{end}");
        } else {
            info!("resource {resource_id}: override {date} closed");
        }
        Ok(date_override)
    }

    /// `false` if there was no override for the date.
    pub async fn clear_date_override(
        &self,
        actor: UserId,
        resource_id: ResourceId,
        date: NaiveDate,
    ) -> Result<bool, EngineError> {
        self.require_owner(actor, resource_id, "edit this resource's overrides")
            .await?;
        if self.store.date_override(resource_id, date).await?.is_none() {
            return Ok(false);
        }
        self.store.remove_date_override(resource_id, date).await?;
        info!("resource {resource_id}: override {date} cleared");
        Ok(true)
    }

    pub async fn add_blackout(
        &self,
        actor: UserId,
        resource_id: ResourceId,
        start: Ms,
        end: Ms,
        reason: Option<String>,
        recurring: bool,
    ) -> Result<BlackoutPeriod, EngineError> {
        let span = validate_window(start, end, MAX_BLACKOUT_DURATION_MS)?;
        if recurring && span.duration_ms() > WEEK_MS {
            return Err(EngineError::LimitExceeded("recurring blackout longer than a week"));
        }
        validate_text(reason.as_deref(), MAX_REASON_LEN, "blackout reason too long")?;
        self.require_owner(actor, resource_id, "edit this resource's blackouts")
            .await?;
        let everything = Span::new(MIN_VALID_TIMESTAMP_MS, MAX_VALID_TIMESTAMP_MS);
        if self.store.blackout_periods(resource_id, &everything).await?.len() >= MAX_BLACKOUTS_PER_RESOURCE {
            return Err(EngineError::LimitExceeded("too many blackout periods"));
        }

        let blackout = BlackoutPeriod {
            id: Ulid::new(),
            resource_id,
            span,
            reason,
            recurring,
        };
        self.store.save_blackout(&blackout).await?;
        info!(
            "resource {resource_id}: blackout {} [{}, {}){}",
            blackout.id,
            span.start,
            span.end,
            if recurring { " weekly" } else { "" }
        );
        Ok(blackout)
    }

    pub async fn remove_blackout(&self, actor: UserId, blackout_id: Ulid) -> Result<(), EngineError> {
        let blackout = self
            .store
            .blackout(blackout_id)
            .await?
            .ok_or(EngineError::EntityNotFound(blackout_id))?;
        self.require_owner(actor, blackout.resource_id, "edit this resource's blackouts")
            .await?;
        self.store.remove_blackout(blackout_id, blackout.resource_id).await?;
        info!("resource {}: blackout {blackout_id} removed", blackout.resource_id);
        Ok(())
    }

    pub async fn add_goal(&self, user: UserId, title: String) -> Result<Goal, EngineError> {
        if title.is_empty() {
            return Err(EngineError::LimitExceeded("goal title is empty"));
        }
        validate_text(Some(&title), MAX_GOAL_TITLE_LEN, "goal title too long")?;
        let goal = Goal {
            id: Ulid::new(),
            user_id: user,
            title,
            completed: false,
            linked_reservation: None,
        };
        self.store.save_goal(&goal).await?;
        info!("user {user}: goal {} added", goal.id);
        Ok(goal)
    }

    pub async fn goal(&self, id: Ulid) -> Result<Goal, EngineError> {
        self.store.goal(id).await?.ok_or(EngineError::EntityNotFound(id))
    }
}
