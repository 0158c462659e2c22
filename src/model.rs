use chrono::{DateTime, Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, UTC. The only instant type.
pub type Ms = i64;

pub type ResourceId = u64;
pub type UserId = u64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 60 * MINUTE_MS;
pub const DAY_MS: Ms = 24 * HOUR_MS;
pub const WEEK_MS: Ms = 7 * DAY_MS;

/// One time credit is earned per started quarter hour.
pub const CREDIT_UNIT_MS: Ms = 15 * MINUTE_MS;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// `None` for degenerate input (`start >= end`).
    pub fn checked(start: Ms, end: Ms) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersection(&self, other: &Span) -> Option<Span> {
        Span::checked(self.start.max(other.start), self.end.min(other.end))
    }

    pub fn shifted(&self, by: Ms) -> Span {
        Span {
            start: self.start + by,
            end: self.end + by,
        }
    }
}

/// Minutes since midnight, `0..=1440`. 1440 is the end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(1440);

    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes <= Self::END_OF_DAY.0).then_some(Self(minutes))
    }

    /// `None` unless `minute < 60` and the result is at most 24:00.
    pub fn hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        hour.checked_mul(60)?
            .checked_add(minute)
            .and_then(Self::from_minutes)
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }

    pub fn offset_ms(&self) -> Ms {
        Ms::from(self.0) * MINUTE_MS
    }

    /// The instant this time of day falls on `date` (UTC).
    pub fn on(&self, date: NaiveDate) -> Ms {
        date_start_ms(date) + self.offset_ms()
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

// ── Calendar helpers (UTC) ───────────────────────────────────────

pub fn date_start_ms(date: NaiveDate) -> Ms {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

pub fn day_span(date: NaiveDate) -> Span {
    let start = date_start_ms(date);
    Span::new(start, start + DAY_MS)
}

/// Calendar date containing the instant `t`.
pub fn date_of(t: Ms) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(t).map(|dt| dt.date_naive())
}

/// 0 = Sunday … 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Every calendar date the span touches, in order.
pub fn dates_touched(span: &Span) -> Vec<NaiveDate> {
    let (Some(first), Some(last)) = (date_of(span.start), date_of(span.end - 1)) else {
        return Vec::new();
    };
    first.iter_days().take_while(|d| *d <= last).collect()
}

/// `ceil(duration / 15 minutes)`, awarded to each party of a completed exchange.
pub fn credits_for(span: &Span) -> u32 {
    let units = (span.duration_ms() + CREDIT_UNIT_MS - 1) / CREDIT_UNIT_MS;
    u32::try_from(units).unwrap_or(u32::MAX)
}

// ── Availability sources ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub owner: UserId,
}

/// Recurring weekly open window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTemplate {
    pub id: Ulid,
    pub resource_id: ResourceId,
    /// 0 = Sunday … 6 = Saturday.
    pub day_of_week: u8,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub active: bool,
}

impl WeeklyTemplate {
    pub fn applies_to(&self, date: NaiveDate) -> bool {
        self.active && self.day_of_week == weekday_index(date)
    }

    pub fn span_on(&self, date: NaiveDate) -> Option<Span> {
        Span::checked(self.start.on(date), self.end.on(date))
    }
}

/// Date-specific window. Replaces the weekly templates for its date entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOverride {
    pub id: Ulid,
    pub resource_id: ResourceId,
    pub date: NaiveDate,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub is_available: bool,
    pub note: Option<String>,
}

impl DateOverride {
    /// The open window this override contributes. Empty for an explicit closure.
    pub fn open_span(&self) -> Option<Span> {
        if !self.is_available {
            return None;
        }
        Span::checked(self.start.on(self.date), self.end.on(self.date))
    }
}

/// Hard unavailability, subtracted from whatever the templates or override produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutPeriod {
    pub id: Ulid,
    pub resource_id: ResourceId,
    pub span: Span,
    pub reason: Option<String>,
    /// Repeats every 7 days from its first occurrence onward.
    pub recurring: bool,
}

impl BlackoutPeriod {
    /// Occurrences of this blackout that overlap `window`, sorted by start.
    pub fn occurrences_within(&self, window: &Span) -> Vec<Span> {
        if !self.recurring {
            return if self.span.overlaps(window) {
                vec![self.span]
            } else {
                Vec::new()
            };
        }
        let mut out = Vec::new();
        let mut k = (window.start - self.span.end).div_euclid(WEEK_MS).max(0);
        loop {
            let occurrence = self.span.shifted(k * WEEK_MS);
            if occurrence.start >= window.end {
                break;
            }
            if occurrence.overlaps(window) {
                out.push(occurrence);
            }
            k += 1;
        }
        out
    }
}

// ── Reservations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    Requested,
    Accepted,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    /// Accepted and completed reservations hold their window on the timeline.
    pub fn occupies(&self) -> bool {
        matches!(self, ReservationStatus::Accepted | ReservationStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Requested => "requested",
            ReservationStatus::Accepted => "accepted",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyRole {
    Requestor,
    Provider,
}

/// A booking of a property or a skill exchange with a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub requestor_id: UserId,
    pub resource_id: ResourceId,
    /// Owner of `resource_id` at the time of the request.
    pub provider_id: UserId,
    pub span: Span,
    pub status: ReservationStatus,
    pub requestor_confirmed: bool,
    pub provider_confirmed: bool,
    pub created_at: Ms,
    pub accepted_at: Option<Ms>,
    pub completed_at: Option<Ms>,
    pub cancel_reason: Option<String>,
}

impl Reservation {
    pub fn role_of(&self, user: UserId) -> Option<PartyRole> {
        if user == self.requestor_id {
            Some(PartyRole::Requestor)
        } else if user == self.provider_id {
            Some(PartyRole::Provider)
        } else {
            None
        }
    }

    pub fn is_confirmed_by(&self, role: PartyRole) -> bool {
        match role {
            PartyRole::Requestor => self.requestor_confirmed,
            PartyRole::Provider => self.provider_confirmed,
        }
    }

    pub fn set_confirmed(&mut self, role: PartyRole) {
        match role {
            PartyRole::Requestor => self.requestor_confirmed = true,
            PartyRole::Provider => self.provider_confirmed = true,
        }
    }

    pub fn both_confirmed(&self) -> bool {
        self.requestor_confirmed && self.provider_confirmed
    }

    pub fn parties(&self) -> [UserId; 2] {
        [self.requestor_id, self.provider_id]
    }
}

/// A personal goal a completed exchange can be attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Ulid,
    pub user_id: UserId,
    pub title: String,
    pub completed: bool,
    pub linked_reservation: Option<Ulid>,
}

impl Goal {
    pub fn is_open_and_unlinked(&self) -> bool {
        !self.completed && self.linked_reservation.is_none()
    }
}

// ── Notifications ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationPayload {
    /// The accepted window is about to start.
    Reminder {
        reservation_id: Ulid,
        recipient: UserId,
        starts_at: Ms,
    },
    CompletionNotice {
        reservation_id: Ulid,
        recipient: UserId,
        credits: u32,
    },
    FollowUp {
        reservation_id: Ulid,
        recipient: UserId,
    },
}

impl NotificationPayload {
    pub fn reservation_id(&self) -> Ulid {
        match self {
            NotificationPayload::Reminder { reservation_id, .. }
            | NotificationPayload::CompletionNotice { reservation_id, .. }
            | NotificationPayload::FollowUp { reservation_id, .. } => *reservation_id,
        }
    }

    pub fn recipient(&self) -> UserId {
        match self {
            NotificationPayload::Reminder { recipient, .. }
            | NotificationPayload::CompletionNotice { recipient, .. }
            | NotificationPayload::FollowUp { recipient, .. } => *recipient,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NotificationPayload::Reminder { .. } => "reminder",
            NotificationPayload::CompletionNotice { .. } => "completion_notice",
            NotificationPayload::FollowUp { .. } => "follow_up",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: Ulid,
    pub payload: NotificationPayload,
    pub fire_at: Ms,
    pub delivered: bool,
}

/// The log record format. Every store mutation is one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResourceRegistered {
        id: ResourceId,
        owner: UserId,
    },
    TemplateSaved {
        template: WeeklyTemplate,
    },
    OverrideSaved {
        date_override: DateOverride,
    },
    OverrideRemoved {
        resource_id: ResourceId,
        date: NaiveDate,
    },
    BlackoutSaved {
        blackout: BlackoutPeriod,
    },
    BlackoutRemoved {
        id: Ulid,
        resource_id: ResourceId,
    },
    ReservationSaved {
        reservation: Reservation,
    },
    NotificationScheduled {
        notification: ScheduledNotification,
    },
    NotificationDelivered {
        id: Ulid,
    },
    NotificationsDiscarded {
        reservation_id: Ulid,
    },
    GoalSaved {
        goal: Goal,
    },
    GoalLinked {
        goal_id: Ulid,
        reservation_id: Ulid,
    },
}
