use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::MIN_RESERVATION_MINUTES;
use crate::model::{Ms, Reservation, TimeRange};

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

/// Temporal validity: strict ordering, then minimum duration. Pure; no I/O.
pub fn validate_range(range: &TimeRange) -> Result<(), EngineError> {
    if range.start >= range.end {
        return Err(EngineError::EndNotAfterStart {
            start: range.start,
            end: range.end,
        });
    }
    if range.duration_min() < MIN_RESERVATION_MINUTES {
        return Err(EngineError::BelowMinimumDuration {
            minutes: range.duration_min(),
        });
    }
    Ok(())
}

/// A proposed slot, before it has an id or a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCandidate<'a> {
    pub resource_id: &'a str,
    pub date: NaiveDate,
    pub range: TimeRange,
}

/// Return the first reservation (in input order) on the candidate's resource
/// and calendar day whose range overlaps the candidate's, skipping
/// `exclude` (the "everyone but myself" case for a future edit path).
///
/// Pure and side-effect free, so it is safe to call against a draft the
/// user is still editing. The function does not sort; callers supply a
/// stable order.
pub fn find_conflict<'a>(
    candidate: &SlotCandidate<'_>,
    existing: &'a [Reservation],
    exclude: Option<Ulid>,
) -> Option<&'a Reservation> {
    existing.iter().find(|r| {
        r.resource_id == candidate.resource_id
            && r.date == candidate.date
            && exclude != Some(r.id)
            && r.range.overlaps(&candidate.range)
    })
}
