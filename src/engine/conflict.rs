use ulid::Ulid;

use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or_default()
}

/// Reject degenerate and out-of-range windows before they reach anything else.
pub(crate) fn validate_window(start: Ms, end: Ms, max_duration: Ms) -> Result<Span, EngineError> {
    use crate::limits::*;
    let span = Span::checked(start, end).ok_or(EngineError::InvalidWindow { start, end })?;
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > max_duration {
        return Err(EngineError::LimitExceeded("window too wide"));
    }
    Ok(span)
}

pub(crate) fn validate_text(text: Option<&str>, max_len: usize, what: &'static str) -> Result<(), EngineError> {
    match text {
        Some(t) if t.len() > max_len => Err(EngineError::LimitExceeded(what)),
        _ => Ok(()),
    }
}

/// First reservation holding the timeline that overlaps `span`.
/// `exclude` skips one reservation (re-validating an in-flight update).
pub fn find_conflict<'a>(
    reservations: &'a [Reservation],
    span: &Span,
    exclude: Option<Ulid>,
) -> Option<&'a Reservation> {
    reservations
        .iter()
        .filter(|r| r.status.occupies())
        .filter(|r| Some(r.id) != exclude)
        .find(|r| r.span.overlaps(span))
}

pub(crate) fn check_no_conflict(
    reservations: &[Reservation],
    span: &Span,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    match find_conflict(reservations, span, exclude) {
        Some(existing) => Err(EngineError::SlotConflict {
            reservation_id: existing.id,
            window: existing.span,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Ms = HOUR_MS;
    const BASE: Ms = 1_893_974_400_000; // 2030-01-07T00:00:00Z

    fn reservation(start: Ms, end: Ms, status: ReservationStatus) -> Reservation {
        Reservation {
            id: Ulid::new(),
            requestor_id: 1,
            resource_id: 1,
            provider_id: 2,
            span: Span::new(start, end),
            status,
            requestor_confirmed: false,
            provider_confirmed: false,
            created_at: 0,
            accepted_at: None,
            completed_at: None,
            cancel_reason: None,
        }
    }

    #[test]
    fn partial_overlap_conflicts() {
        let a = reservation(BASE + 10 * H, BASE + 11 * H, ReservationStatus::Accepted);
        let existing = vec![a.clone()];
        let probe = Span::new(BASE + 10 * H + H / 2, BASE + 11 * H + H / 2);
        assert_eq!(find_conflict(&existing, &probe, None).map(|r| r.id), Some(a.id));
    }

    #[test]
    fn adjacent_does_not_conflict() {
        let existing = vec![reservation(BASE + 10 * H, BASE + 11 * H, ReservationStatus::Accepted)];
        let probe = Span::new(BASE + 11 * H, BASE + 12 * H);
        assert!(find_conflict(&existing, &probe, None).is_none());
        let probe = Span::new(BASE + 9 * H, BASE + 10 * H);
        assert!(find_conflict(&existing, &probe, None).is_none());
    }

    #[test]
    fn containment_and_identity_conflict() {
        let existing = vec![reservation(BASE + 10 * H, BASE + 12 * H, ReservationStatus::Accepted)];
        assert!(find_conflict(&existing, &Span::new(BASE + 10 * H, BASE + 12 * H), None).is_some());
        assert!(find_conflict(&existing, &Span::new(BASE + 11 * H, BASE + 11 * H + 1), None).is_some());
        assert!(find_conflict(&existing, &Span::new(BASE, BASE + 20 * H), None).is_some());
    }

    #[test]
    fn requested_and_cancelled_do_not_block() {
        let existing = vec![
            reservation(BASE + 10 * H, BASE + 11 * H, ReservationStatus::Requested),
            reservation(BASE + 10 * H, BASE + 11 * H, ReservationStatus::Cancelled),
        ];
        assert!(find_conflict(&existing, &Span::new(BASE + 10 * H, BASE + 11 * H), None).is_none());
    }

    #[test]
    fn completed_still_blocks() {
        let existing = vec![reservation(BASE + 10 * H, BASE + 11 * H, ReservationStatus::Completed)];
        assert!(find_conflict(&existing, &Span::new(BASE + 10 * H, BASE + 11 * H), None).is_some());
    }

    #[test]
    fn exclude_skips_own_reservation() {
        let a = reservation(BASE + 10 * H, BASE + 11 * H, ReservationStatus::Accepted);
        let existing = vec![a.clone()];
        assert!(find_conflict(&existing, &a.span, Some(a.id)).is_none());
    }

    #[test]
    fn check_reports_conflicting_window() {
        let a = reservation(BASE + 10 * H, BASE + 11 * H, ReservationStatus::Accepted);
        let err = check_no_conflict(std::slice::from_ref(&a), &a.span, None).unwrap_err();
        match err {
            EngineError::SlotConflict { reservation_id, window } => {
                assert_eq!(reservation_id, a.id);
                assert_eq!(window, a.span);
            }
            other => panic!("expected SlotConflict, got {other:?}"),
        }
    }

    #[test]
    fn validate_window_rejects_degenerate() {
        let max = crate::limits::MAX_RESERVATION_DURATION_MS;
        assert!(matches!(
            validate_window(BASE, BASE, max),
            Err(EngineError::InvalidWindow { .. })
        ));
        assert!(matches!(
            validate_window(BASE + 1, BASE, max),
            Err(EngineError::InvalidWindow { .. })
        ));
        assert!(matches!(
            validate_window(0, 1000, max),
            Err(EngineError::LimitExceeded(_))
        ));
        assert!(matches!(
            validate_window(BASE, BASE + max + 1, max),
            Err(EngineError::LimitExceeded(_))
        ));
        assert_eq!(validate_window(BASE, BASE + H, max).unwrap(), Span::new(BASE, BASE + H));
    }
}
