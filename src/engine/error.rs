use ulid::Ulid;

use crate::model::{Ms, ReservationStatus, ResourceId, Span, UserId};

#[derive(Debug)]
pub enum EngineError {
    /// Zero-length or inverted interval.
    InvalidWindow { start: Ms, end: Ms },
    /// The window is not fully inside the resource's open intervals.
    OutsideAvailability { window: Span, uncovered: Vec<Span> },
    /// Overlaps a reservation that already holds the timeline.
    SlotConflict { reservation_id: Ulid, window: Span },
    InvalidStateTransition {
        id: Ulid,
        from: ReservationStatus,
        action: &'static str,
    },
    NotAuthorizedParty { user: UserId, action: &'static str },
    ResourceNotFound(ResourceId),
    ReservationNotFound(Ulid),
    EntityNotFound(Ulid),
    AlreadyExists(ResourceId),
    LimitExceeded(&'static str),
    Storage(String),
}

impl EngineError {
    /// Expected business rejections, as opposed to storage faults.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, EngineError::Storage(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidWindow { start, end } => {
                write!(f, "invalid window [{start}, {end}): start must be before end")
            }
            EngineError::OutsideAvailability { window, uncovered } => write!(
                f,
                "window [{}, {}) is outside availability; uncovered: {:?}",
                window.start, window.end, uncovered
            ),
            EngineError::SlotConflict {
                reservation_id,
                window,
            } => write!(
                f,
                "slot taken by reservation {reservation_id} [{}, {})",
                window.start, window.end
            ),
            EngineError::InvalidStateTransition { id, from, action } => {
                write!(f, "cannot {action} reservation {id}: it is {from}")
            }
            EngineError::NotAuthorizedParty { user, action } => {
                write!(f, "user {user} is not allowed to {action}")
            }
            EngineError::ResourceNotFound(id) => write!(f, "resource not found: {id}"),
            EngineError::ReservationNotFound(id) => write!(f, "reservation not found: {id}"),
            EngineError::EntityNotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "resource already exists: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}
