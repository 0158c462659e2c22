use crate::model::{DAY_MS, Ms};

/// 2000-01-01T00:00:00Z.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// Longest single reservation window.
pub const MAX_RESERVATION_DURATION_MS: Ms = 31 * DAY_MS;
/// Longest blackout period.
pub const MAX_BLACKOUT_DURATION_MS: Ms = 366 * DAY_MS;
/// Widest range `open_intervals_between` will resolve.
pub const MAX_QUERY_WINDOW_MS: Ms = 366 * DAY_MS;

pub const MAX_TEMPLATES_PER_RESOURCE: usize = 128;
pub const MAX_BLACKOUTS_PER_RESOURCE: usize = 4096;

pub const MAX_NOTE_LEN: usize = 1024;
pub const MAX_REASON_LEN: usize = 1024;
pub const MAX_GOAL_TITLE_LEN: usize = 256;
