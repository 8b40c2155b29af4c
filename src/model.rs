use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes since midnight — the only wall-clock time type.
pub type Minutes = i32;

/// Unix milliseconds, used for `created_at` stamps.
pub type Ms = i64;

/// Malformed time or date input. Always a data-integrity condition when it
/// comes from persisted data; callers must fail the operation, not coerce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Time(String),
    Date(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Time(s) => write!(f, "malformed time {s:?}: expected HH:MM"),
            ParseError::Date(s) => write!(f, "malformed date {s:?}: expected YYYY-MM-DD"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse "HH:MM" into minutes since midnight.
///
/// Strict: exactly two colon-separated components, both numeric, hour 0-23,
/// minute 0-59. Anything else is a `ParseError`.
pub fn parse_time(s: &str) -> Result<Minutes, ParseError> {
    let err = || ParseError::Time(s.to_string());
    let (h, m) = s.split_once(':').ok_or_else(err)?;
    let digits =
        |part: &str| !part.is_empty() && part.len() <= 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(h) || !digits(m) {
        return Err(err());
    }
    let hour: Minutes = h.parse().map_err(|_| err())?;
    let minute: Minutes = m.parse().map_err(|_| err())?;
    if hour > 23 || minute > 59 {
        return Err(err());
    }
    Ok(hour * 60 + minute)
}

/// Format minutes since midnight as zero-padded "HH:MM".
pub fn format_time(minutes: Minutes) -> String {
    debug_assert!((0..1440).contains(&minutes), "time of day out of range");
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Parse "YYYY-MM-DD" into a calendar date.
///
/// `NaiveDate` compares by (year, month, day) fields only — no instant, no
/// UTC conversion, so a date never shifts by a day across timezones.
pub fn parse_date(s: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ParseError::Date(s.to_string()))
}

/// Half-open time range `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Minutes,
    pub end: Minutes,
}

impl TimeRange {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "TimeRange start must be before end");
        Self { start, end }
    }

    pub fn duration_min(&self) -> Minutes {
        self.end - self.start
    }

    /// The single overlap law: `a.start < b.end && b.start < a.end`.
    /// A range ending at 10:00 does not overlap one starting at 10:00.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", format_time(self.start), format_time(self.end))
    }
}

/// What a catalog entry is: a pool vehicle or a bookable room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vehicle,
    Space,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Vehicle => write!(f, "vehicle"),
            ResourceKind::Space => write!(f, "space"),
        }
    }
}

/// Immutable catalog entry. Seeded once at startup, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    pub kind: ResourceKind,
    /// Seats for a room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    /// License plate for a vehicle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
}

/// A confirmed reservation. `id` and `created_at` are assigned by the store;
/// the record is never updated in place — the only mutation is delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub kind: ResourceKind,
    pub resource_id: String,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub reserved_by: String,
    pub purpose: String,
    pub created_at: Ms,
}

/// Client-supplied input for `create`. No id, no timestamp — the store owns
/// both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub kind: ResourceKind,
    pub resource_id: String,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub reserved_by: String,
    pub purpose: String,
}

/// WAL record format — flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ReservationCreated {
        reservation: Reservation,
    },
    ReservationDeleted {
        id: Ulid,
        resource_id: String,
    },
}

/// All reservations for one resource, grouped by calendar day.
///
/// Each day's vector is kept sorted by `range.start`, so conflict checks
/// report the earliest-starting overlapping reservation and listings come
/// out in a stable order.
#[derive(Debug, Clone)]
pub struct ResourceBook {
    pub resource_id: String,
    days: BTreeMap<NaiveDate, Vec<Reservation>>,
}

impl ResourceBook {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            days: BTreeMap::new(),
        }
    }

    /// Insert maintaining sort order by start time within the day.
    pub fn insert(&mut self, reservation: Reservation) {
        let day = self.days.entry(reservation.date).or_default();
        let pos = day
            .binary_search_by_key(&reservation.range.start, |r| r.range.start)
            .unwrap_or_else(|e| e);
        day.insert(pos, reservation);
    }

    /// Remove by id, pruning the day entry if it becomes empty.
    pub fn remove(&mut self, id: Ulid) -> Option<Reservation> {
        let mut hit: Option<(NaiveDate, usize)> = None;
        for (date, day) in &self.days {
            if let Some(pos) = day.iter().position(|r| r.id == id) {
                hit = Some((*date, pos));
                break;
            }
        }
        let (date, pos) = hit?;
        let day = self.days.get_mut(&date)?;
        let removed = day.remove(pos);
        if day.is_empty() {
            self.days.remove(&date);
        }
        Some(removed)
    }

    pub fn contains(&self, id: Ulid) -> bool {
        self.days.values().any(|day| day.iter().any(|r| r.id == id))
    }

    /// Reservations on `date`, sorted by start time. Empty slice if none.
    pub fn on_date(&self, date: NaiveDate) -> &[Reservation] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reservations whose date falls within the given calendar month.
    /// Relies on the BTreeMap's date ordering — nothing outside the month
    /// bounds is touched.
    pub fn in_month(&self, year: i32, month: u32) -> impl Iterator<Item = &Reservation> {
        month_bounds(year, month)
            .into_iter()
            .flat_map(move |(first, next)| self.days.range(first..next))
            .flat_map(|(_, day)| day.iter())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reservation> {
        self.days.values().flat_map(|day| day.iter())
    }

    pub fn day_count(&self, date: NaiveDate) -> usize {
        self.days.get(&date).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// First day of the month and first day of the following month, or `None`
/// for an out-of-range month number.
fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next))
}
