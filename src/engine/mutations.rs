use std::time::Instant;

use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{self, rejection_label};

use super::conflict::{now_ms, validate_text, validate_window};
use super::{Engine, EngineError};

/// Result of a completion confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Recorded; still waiting for the other party.
    Pending(Reservation),
    /// Both parties confirmed. Each was credited `credits`.
    Completed { reservation: Reservation, credits: u32 },
}

impl Confirmation {
    pub fn reservation(&self) -> &Reservation {
        match self {
            Confirmation::Pending(r) => r,
            Confirmation::Completed { reservation, .. } => reservation,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Confirmation::Completed { .. })
    }
}

fn rejected(operation: &'static str, err: EngineError) -> EngineError {
    if err.is_rejection() {
        metrics::counter!(
            observability::RESERVATIONS_REJECTED_TOTAL,
            "operation" => operation,
            "reason" => rejection_label(&err)
        )
        .increment(1);
    }
    err
}

impl Engine {
    /// Request a window. Checked against accepted reservations only: other
    /// requests for the same window do not block this one.
    pub async fn create(
        &self,
        requestor: UserId,
        resource_id: ResourceId,
        start: Ms,
        end: Ms,
    ) -> Result<Reservation, EngineError> {
        let span = validate_window(start, end, MAX_RESERVATION_DURATION_MS)
            .map_err(|e| rejected("create", e))?;
        let resource = self
            .require_resource(resource_id)
            .await
            .map_err(|e| rejected("create", e))?;
        if resource.owner == requestor {
            return Err(rejected(
                "create",
                EngineError::NotAuthorizedParty {
                    user: requestor,
                    action: "reserve their own resource",
                },
            ));
        }
        self.check_span(resource_id, &span, None, self.config.policy)
            .await
            .map_err(|e| rejected("create", e))?;

        let reservation = Reservation {
            id: Ulid::new(),
            requestor_id: requestor,
            resource_id,
            provider_id: resource.owner,
            span,
            status: ReservationStatus::Requested,
            requestor_confirmed: false,
            provider_confirmed: false,
            created_at: now_ms(),
            accepted_at: None,
            completed_at: None,
            cancel_reason: None,
        };
        self.store.save_reservation(&reservation).await?;

        metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL).increment(1);
        info!(
            "reservation {} requested by user {requestor} on resource {resource_id} [{}, {})",
            reservation.id, span.start, span.end
        );
        Ok(reservation)
    }

    /// Move a request to `accepted`. The full check re-runs under the resource
    /// lock; on rejection the reservation stays `requested`.
    pub async fn accept(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        let (mut reservation, guard) = self.lock_reservation(id).await?;

        if reservation.status != ReservationStatus::Requested {
            return Err(rejected(
                "accept",
                EngineError::InvalidStateTransition {
                    id,
                    from: reservation.status,
                    action: "accept",
                },
            ));
        }

        if let Err(e) = self
            .check_span(reservation.resource_id, &reservation.span, None, self.config.policy)
            .await
        {
            info!("accept of reservation {id} refused: {e}");
            return Err(rejected("accept", e));
        }

        reservation.status = ReservationStatus::Accepted;
        reservation.accepted_at = Some(now_ms());
        self.store.save_reservation(&reservation).await?;
        // Reminders must exist before a cancel can take the lock.
        self.schedule_reminders(&reservation).await;
        drop(guard);

        metrics::histogram!(observability::ACCEPT_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(observability::RESERVATIONS_ACCEPTED_TOTAL).increment(1);
        info!(
            "reservation {id} accepted on resource {} [{}, {})",
            reservation.resource_id, reservation.span.start, reservation.span.end
        );
        Ok(reservation)
    }

    /// Record that `actor` considers the exchange done. The second party's
    /// confirmation completes the reservation and triggers rewards, notices,
    /// follow-ups, and goal linkage.
    pub async fn confirm_completion(&self, id: Ulid, actor: UserId) -> Result<Confirmation, EngineError> {
        let (mut reservation, guard) = self.lock_reservation(id).await?;

        let role = reservation.role_of(actor).ok_or(EngineError::NotAuthorizedParty {
            user: actor,
            action: "confirm completion of this reservation",
        })?;
        if reservation.status != ReservationStatus::Accepted {
            return Err(EngineError::InvalidStateTransition {
                id,
                from: reservation.status,
                action: "confirm completion of",
            });
        }
        if reservation.is_confirmed_by(role) {
            return Err(EngineError::InvalidStateTransition {
                id,
                from: reservation.status,
                action: "confirm completion twice of",
            });
        }

        reservation.set_confirmed(role);
        if !reservation.both_confirmed() {
            self.store.save_reservation(&reservation).await?;
            debug!("reservation {id}: {role:?} confirmed completion, waiting for counterpart");
            return Ok(Confirmation::Pending(reservation));
        }

        reservation.status = ReservationStatus::Completed;
        reservation.completed_at = Some(now_ms());
        self.store.save_reservation(&reservation).await?;
        drop(guard);

        let credits = credits_for(&reservation.span);
        metrics::counter!(observability::RESERVATIONS_COMPLETED_TOTAL).increment(1);
        info!("reservation {id} completed, {credits} credits to each party");

        self.after_completion(&reservation, credits).await;
        Ok(Confirmation::Completed { reservation, credits })
    }

    /// Cancel from `requested` or `accepted`. The window is free again immediately.
    pub async fn cancel(&self, id: Ulid, actor: UserId, reason: Option<String>) -> Result<Reservation, EngineError> {
        validate_text(reason.as_deref(), MAX_REASON_LEN, "cancel reason too long")?;
        let (mut reservation, guard) = self.lock_reservation(id).await?;

        if reservation.role_of(actor).is_none() {
            return Err(EngineError::NotAuthorizedParty {
                user: actor,
                action: "cancel this reservation",
            });
        }
        let from = reservation.status;
        if !matches!(from, ReservationStatus::Requested | ReservationStatus::Accepted) {
            return Err(EngineError::InvalidStateTransition {
                id,
                from,
                action: "cancel",
            });
        }

        reservation.status = ReservationStatus::Cancelled;
        reservation.cancel_reason = reason;
        self.store.save_reservation(&reservation).await?;
        if let Err(e) = self.scheduler.discard_pending(id).await {
            warn!("reservation {id}: discarding pending notifications failed: {e}");
        }
        drop(guard);

        metrics::counter!(observability::RESERVATIONS_CANCELLED_TOTAL, "from" => from.as_str())
            .increment(1);
        info!("reservation {id} cancelled by user {actor} (was {from})");
        Ok(reservation)
    }

    // ── Post-commit side effects ─────────────────────────────

    async fn schedule_reminders(&self, reservation: &Reservation) {
        let Some(lead) = self.config.reminder_lead_ms else {
            return;
        };
        let fire_at = reservation.span.start - lead;
        if fire_at <= now_ms() {
            return;
        }
        for recipient in reservation.parties() {
            self.schedule_or_warn(
                NotificationPayload::Reminder {
                    reservation_id: reservation.id,
                    recipient,
                    starts_at: reservation.span.start,
                },
                fire_at,
            )
            .await;
        }
    }

    async fn after_completion(&self, reservation: &Reservation, credits: u32) {
        for user in reservation.parties() {
            match self.ledger.credit_user(user, credits).await {
                Ok(()) => {
                    metrics::counter!(observability::CREDITS_ISSUED_TOTAL).increment(u64::from(credits));
                }
                Err(e) => warn!("reservation {}: crediting user {user} failed: {e}", reservation.id),
            }
        }

        let completed_at = reservation.completed_at.unwrap_or_else(now_ms);
        for recipient in reservation.parties() {
            self.schedule_or_warn(
                NotificationPayload::CompletionNotice {
                    reservation_id: reservation.id,
                    recipient,
                    credits,
                },
                completed_at,
            )
            .await;
            self.schedule_or_warn(
                NotificationPayload::FollowUp {
                    reservation_id: reservation.id,
                    recipient,
                },
                completed_at + self.config.follow_up_delay_ms,
            )
            .await;
        }

        self.link_first_open_goal(reservation).await;
    }

    async fn schedule_or_warn(&self, payload: NotificationPayload, fire_at: Ms) {
        let kind = payload.kind();
        let reservation_id = payload.reservation_id();
        if let Err(e) = self.scheduler.schedule(payload, fire_at).await {
            warn!("reservation {reservation_id}: scheduling {kind} failed: {e}");
        }
    }

    /// First match, not best match: the requester's oldest open unlinked goal.
    /// Serialised per requester so concurrent completions pick distinct goals.
    async fn link_first_open_goal(&self, reservation: &Reservation) {
        let _guard = self.goal_lock(reservation.requestor_id).lock_owned().await;
        let goals = match self.store.open_goals(reservation.requestor_id).await {
            Ok(goals) => goals,
            Err(e) => {
                warn!("reservation {}: loading goals failed: {e}", reservation.id);
                return;
            }
        };
        let Some(goal) = goals.into_iter().find(Goal::is_open_and_unlinked) else {
            debug!("reservation {}: no open goal to link", reservation.id);
            return;
        };
        match self.store.link_goal(goal.id, reservation.id).await {
            Ok(()) => info!("reservation {} linked to goal {}", reservation.id, goal.id),
            Err(e) => warn!("reservation {}: linking goal {} failed: {e}", reservation.id, goal.id),
        }
    }
}
