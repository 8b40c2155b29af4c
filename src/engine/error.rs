use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::{Minutes, ParseError, ResourceKind, TimeRange};

/// The conflicting reservation, in enough detail for a caller to render a
/// human-readable message and pick a different slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDetails {
    pub id: Ulid,
    pub range: TimeRange,
    pub reserved_by: String,
}

#[derive(Debug)]
pub enum EngineError {
    /// Malformed time/date input — a data-integrity bug, never retried.
    Parse(ParseError),
    /// Zero or negative duration.
    EndNotAfterStart { start: Minutes, end: Minutes },
    /// Shorter than the minimum reservation length.
    BelowMinimumDuration { minutes: Minutes },
    /// The slot is already taken. Expected under contention; never retried
    /// with a different slot by the engine — slot choice is the caller's.
    Conflict(ConflictDetails),
    /// Resource id not present in the catalog.
    UnknownResource(String),
    /// Reservation kind does not match the catalog entry's kind.
    KindMismatch {
        resource_id: String,
        expected: ResourceKind,
        got: ResourceKind,
    },
    NotFound(Ulid),
    InvalidInput(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Parse(e) => write!(f, "{e}"),
            EngineError::EndNotAfterStart { start, end } => write!(
                f,
                "end time must be after start time ({} >= {})",
                crate::model::format_time(*start),
                crate::model::format_time(*end),
            ),
            EngineError::BelowMinimumDuration { minutes } => write!(
                f,
                "{minutes} minute reservation is below the {} minute minimum",
                crate::limits::MIN_RESERVATION_MINUTES,
            ),
            EngineError::Conflict(c) => {
                write!(f, "slot taken {} by {}", c.range, c.reserved_by)
            }
            EngineError::UnknownResource(id) => write!(f, "unknown resource: {id}"),
            EngineError::KindMismatch {
                resource_id,
                expected,
                got,
            } => write!(f, "resource {resource_id} is a {expected}, not a {got}"),
            EngineError::NotFound(id) => write!(f, "reservation not found: {id}"),
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ParseError> for EngineError {
    fn from(e: ParseError) -> Self {
        EngineError::Parse(e)
    }
}
