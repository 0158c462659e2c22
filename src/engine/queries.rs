use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::{open_intervals, open_intervals_in_range, uncovered, AvailabilityPolicy};
use super::conflict::{check_no_conflict, find_conflict, validate_window};
use super::{Engine, EngineError};

const HOLDING: [ReservationStatus; 2] = [ReservationStatus::Accepted, ReservationStatus::Completed];

impl Engine {
    /// Open intervals of `resource_id` on `date`, sorted and merged.
    /// An unknown resource has no availability.
    pub async fn open_intervals(&self, resource_id: ResourceId, date: NaiveDate) -> Result<Vec<Span>, EngineError> {
        self.open_intervals_with(resource_id, date, self.config.policy).await
    }

    pub async fn open_intervals_with(
        &self,
        resource_id: ResourceId,
        date: NaiveDate,
        policy: AvailabilityPolicy,
    ) -> Result<Vec<Span>, EngineError> {
        if self.store.resource(resource_id).await?.is_none() {
            return Ok(vec![]);
        }
        let templates = self.store.weekly_templates(resource_id).await?;
        let date_override = self.store.date_override(resource_id, date).await?;
        let blackouts = self.store.blackout_periods(resource_id, &day_span(date)).await?;
        Ok(open_intervals(date, &templates, date_override.as_ref(), &blackouts, policy))
    }

    /// Open intervals across `[start, end)`, clipped to it and merged across midnight.
    pub async fn open_intervals_between(
        &self,
        resource_id: ResourceId,
        start: Ms,
        end: Ms,
    ) -> Result<Vec<Span>, EngineError> {
        let range = validate_window(start, end, MAX_QUERY_WINDOW_MS)?;
        if self.store.resource(resource_id).await?.is_none() {
            return Ok(vec![]);
        }
        self.resolve_range(resource_id, &range, self.config.policy).await
    }

    async fn resolve_range(
        &self,
        resource_id: ResourceId,
        range: &Span,
        policy: AvailabilityPolicy,
    ) -> Result<Vec<Span>, EngineError> {
        let dates = dates_touched(range);
        let (Some(&first), Some(&last)) = (dates.first(), dates.last()) else {
            return Ok(vec![]);
        };
        let templates = self.store.weekly_templates(resource_id).await?;
        let overrides = self.store.date_overrides(resource_id, first, last).await?;
        let days = Span::new(day_span(first).start, day_span(last).end);
        let blackouts = self.store.blackout_periods(resource_id, &days).await?;
        Ok(open_intervals_in_range(range, &templates, &overrides, &blackouts, policy))
    }

    /// Structural check then overlap check. Returns the validated window.
    pub async fn check_reservable(
        &self,
        resource_id: ResourceId,
        start: Ms,
        end: Ms,
        exclude: Option<Ulid>,
    ) -> Result<Span, EngineError> {
        self.check_reservable_with(resource_id, start, end, exclude, self.config.policy)
            .await
    }

    pub async fn check_reservable_with(
        &self,
        resource_id: ResourceId,
        start: Ms,
        end: Ms,
        exclude: Option<Ulid>,
        policy: AvailabilityPolicy,
    ) -> Result<Span, EngineError> {
        let span = validate_window(start, end, MAX_RESERVATION_DURATION_MS)?;
        self.require_resource(resource_id).await?;
        self.check_span(resource_id, &span, exclude, policy).await?;
        Ok(span)
    }

    /// Never cached: every call reads the current sources and reservations.
    pub(super) async fn check_span(
        &self,
        resource_id: ResourceId,
        span: &Span,
        exclude: Option<Ulid>,
        policy: AvailabilityPolicy,
    ) -> Result<(), EngineError> {
        let open = self.resolve_range(resource_id, span, policy).await?;
        let missing = uncovered(span, &open);
        if !missing.is_empty() {
            return Err(EngineError::OutsideAvailability {
                window: *span,
                uncovered: missing,
            });
        }
        let holding = self.store.reservations_by_resource(resource_id, &HOLDING).await?;
        check_no_conflict(&holding, span, exclude)
    }

    /// `false` for any business rejection; `Err` only for storage faults.
    pub async fn can_reserve(
        &self,
        resource_id: ResourceId,
        start: Ms,
        end: Ms,
        exclude: Option<Ulid>,
    ) -> Result<bool, EngineError> {
        self.can_reserve_with(resource_id, start, end, exclude, self.config.policy)
            .await
    }

    pub async fn can_reserve_with(
        &self,
        resource_id: ResourceId,
        start: Ms,
        end: Ms,
        exclude: Option<Ulid>,
        policy: AvailabilityPolicy,
    ) -> Result<bool, EngineError> {
        match self
            .check_reservable_with(resource_id, start, end, exclude, policy)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_rejection() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// The accepted or completed reservation overlapping the window, if any.
    /// Structural availability is not consulted.
    pub async fn has_conflict(
        &self,
        resource_id: ResourceId,
        start: Ms,
        end: Ms,
        exclude: Option<Ulid>,
    ) -> Result<Option<Reservation>, EngineError> {
        let span = validate_window(start, end, MAX_RESERVATION_DURATION_MS)?;
        let holding = self.store.reservations_by_resource(resource_id, &HOLDING).await?;
        Ok(find_conflict(&holding, &span, exclude).cloned())
    }

    pub async fn reservation(&self, id: Ulid) -> Result<Reservation, EngineError> {
        self.store
            .reservation(id)
            .await?
            .ok_or(EngineError::ReservationNotFound(id))
    }

    pub async fn reservations_for_resource(
        &self,
        resource_id: ResourceId,
        statuses: &[ReservationStatus],
    ) -> Result<Vec<Reservation>, EngineError> {
        self.store.reservations_by_resource(resource_id, statuses).await
    }
}
