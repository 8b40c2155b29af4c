use crate::model::Minutes;

/// Earliest bookable start of a day (06:00).
pub const DAY_OPEN: Minutes = 6 * 60;

/// Latest bookable end of a day (22:00).
pub const DAY_CLOSE: Minutes = 22 * 60;

/// A reservation shorter than this is rejected.
pub const MIN_RESERVATION_MINUTES: Minutes = 30;

/// Finest slot granularity the availability scan accepts.
pub const MIN_SLOT_MINUTES: Minutes = 15;

pub const MAX_RESERVED_BY_LEN: usize = 120;
pub const MAX_PURPOSE_LEN: usize = 500;

/// Cap on reservations per resource per day. The operating window holds at
/// most 32 back-to-back 30-minute slots, so this is generous.
pub const MAX_RESERVATIONS_PER_DAY: usize = 64;

/// Cap on catalog size when loading a resources file.
pub const MAX_CATALOG_ENTRIES: usize = 64;

pub const MAX_RESOURCE_ID_LEN: usize = 64;
