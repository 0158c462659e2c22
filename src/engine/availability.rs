use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::*;

/// How a resource with no availability data at all is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityPolicy {
    /// Missing data means closed.
    #[default]
    ClosedWorld,
    /// A resource with no active templates and no override for the date is open all day.
    OpenWorld,
}

// ── Availability Algorithm ────────────────────────────────────────

/// Open intervals of one calendar date.
///
/// Override: REPLACE. An override for `date` shadows the weekly templates entirely,
/// including closing the date when `is_available` is false.
/// Blackouts: SUBTRACT. Every occurrence touching the date is removed, whatever
/// produced the base set.
pub fn open_intervals(
    date: NaiveDate,
    templates: &[WeeklyTemplate],
    date_override: Option<&DateOverride>,
    blackouts: &[BlackoutPeriod],
    policy: AvailabilityPolicy,
) -> Vec<Span> {
    let day = day_span(date);

    // Step 1: base set from the override or the weekly templates
    let mut base: Vec<Span> = match date_override.filter(|o| o.date == date) {
        Some(o) => o.open_span().into_iter().collect(),
        None => {
            let from_templates: Vec<Span> = templates
                .iter()
                .filter(|t| t.applies_to(date))
                .filter_map(|t| t.span_on(date))
                .collect();
            let unconfigured = !templates.iter().any(|t| t.active);
            if from_templates.is_empty() && unconfigured && policy == AvailabilityPolicy::OpenWorld {
                vec![day]
            } else {
                from_templates
            }
        }
    };

    if base.is_empty() {
        return base;
    }

    // Templates may overlap if the owner entered them that way.
    base.sort_by_key(|s| s.start);
    let free = merge_overlapping(&base);

    // Step 2: blackout occurrences on this date, clipped to it
    let mut blocked: Vec<Span> = blackouts
        .iter()
        .flat_map(|b| b.occurrences_within(&day))
        .filter_map(|s| s.intersection(&day))
        .collect();
    if blocked.is_empty() {
        return free;
    }
    blocked.sort_by_key(|s| (s.start, s.end));
    let blocked = merge_overlapping(&blocked);

    merge_overlapping(&subtract_intervals(&free, &blocked))
}

/// Open intervals across every date `range` touches, clipped to `range` and merged
/// across midnight.
pub fn open_intervals_in_range(
    range: &Span,
    templates: &[WeeklyTemplate],
    overrides: &[DateOverride],
    blackouts: &[BlackoutPeriod],
    policy: AvailabilityPolicy,
) -> Vec<Span> {
    let mut open = Vec::new();
    for date in dates_touched(range) {
        let date_override = overrides.iter().find(|o| o.date == date);
        open.extend(
            open_intervals(date, templates, date_override, blackouts, policy)
                .into_iter()
                .filter_map(|s| s.intersection(range)),
        );
    }
    open.sort_by_key(|s| s.start);
    merge_overlapping(&open)
}

/// Parts of `window` not covered by `open`. Empty means fully covered.
pub fn uncovered(window: &Span, open: &[Span]) -> Vec<Span> {
    subtract_intervals(std::slice::from_ref(window), open)
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

/// Remove every `to_remove` span from `base`. Both inputs sorted by start; each base
/// span yields zero, one, or more remainders.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}
