use std::net::SocketAddr;

// ── Lifecycle metrics ───────────────────────────────────────────

/// Counter: reservations created in `requested`.
pub const RESERVATIONS_CREATED_TOTAL: &str = "accordo_reservations_created_total";

/// Counter: rejected create/accept attempts. Labels: operation, reason.
pub const RESERVATIONS_REJECTED_TOTAL: &str = "accordo_reservations_rejected_total";

/// Counter: successful accept transitions.
pub const RESERVATIONS_ACCEPTED_TOTAL: &str = "accordo_reservations_accepted_total";

/// Counter: reservations that reached `completed`.
pub const RESERVATIONS_COMPLETED_TOTAL: &str = "accordo_reservations_completed_total";

/// Counter: cancellations. Labels: from.
pub const RESERVATIONS_CANCELLED_TOTAL: &str = "accordo_reservations_cancelled_total";

/// Counter: time credits issued to parties.
pub const CREDITS_ISSUED_TOTAL: &str = "accordo_credits_issued_total";

/// Histogram: accept-transition latency in seconds, lock wait included.
pub const ACCEPT_DURATION_SECONDS: &str = "accordo_accept_duration_seconds";

// ── Background work ─────────────────────────────────────────────

/// Counter: notifications handed to delivery. Labels: kind, status.
pub const NOTIFICATIONS_DISPATCHED_TOTAL: &str = "accordo_notifications_dispatched_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "accordo_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "accordo_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for a rejection, for metrics.
pub fn rejection_label(err: &crate::engine::EngineError) -> &'static str {
    use crate::engine::EngineError;
    match err {
        EngineError::InvalidWindow { .. } => "invalid_window",
        EngineError::OutsideAvailability { .. } => "outside_availability",
        EngineError::SlotConflict { .. } => "slot_conflict",
        EngineError::InvalidStateTransition { .. } => "invalid_state",
        EngineError::NotAuthorizedParty { .. } => "not_authorized",
        EngineError::ResourceNotFound(_)
        | EngineError::ReservationNotFound(_)
        | EngineError::EntityNotFound(_) => "not_found",
        EngineError::AlreadyExists(_) => "already_exists",
        EngineError::LimitExceeded(_) => "limit_exceeded",
        EngineError::Storage(_) => "storage",
    }
}
