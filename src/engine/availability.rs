use crate::limits::{DAY_CLOSE, DAY_OPEN};
use crate::model::{Minutes, TimeRange};

// ── Free-Slot Scan ────────────────────────────────────────────────

/// Scan the operating window (06:00-22:00) in `slot_minutes` steps and
/// return the start times whose candidate range `[start, start + slot)`
/// overlaps none of `taken`. Candidates whose end would pass the window's
/// close are discarded.
///
/// Stateless: recomputed fresh on every call. A zero or negative slot
/// duration yields no slots.
pub fn free_slots(taken: &[TimeRange], slot_minutes: Minutes) -> Vec<Minutes> {
    if slot_minutes <= 0 {
        return Vec::new();
    }
    let mut starts = Vec::new();
    let mut start = DAY_OPEN;
    while start + slot_minutes <= DAY_CLOSE {
        let candidate = TimeRange::new(start, start + slot_minutes);
        if !taken.iter().any(|t| t.overlaps(&candidate)) {
            starts.push(start);
        }
        start += slot_minutes;
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::format_time;

    #[test]
    fn empty_day_is_fully_free() {
        let slots = free_slots(&[], 60);
        // 06:00 through 21:00 inclusive
        assert_eq!(slots.len(), 16);
        assert_eq!(format_time(slots[0]), "06:00");
        assert_eq!(format_time(*slots.last().unwrap()), "21:00");
    }

    #[test]
    fn booked_hour_drops_one_slot() {
        let taken = vec![TimeRange::new(600, 660)]; // 10:00-11:00
        let slots = free_slots(&taken, 60);
        assert_eq!(slots.len(), 15);
        assert!(!slots.contains(&600));
        assert!(slots.contains(&540));
        assert!(slots.contains(&660));
    }

    #[test]
    fn partial_overlap_blocks_both_neighbors() {
        // 10:30-11:30 touches the 10:00 and 11:00 hour slots
        let taken = vec![TimeRange::new(630, 690)];
        let slots = free_slots(&taken, 60);
        assert!(!slots.contains(&600));
        assert!(!slots.contains(&660));
        assert!(slots.contains(&720));
    }

    #[test]
    fn adjacent_booking_does_not_block() {
        // Ends exactly at 10:00 — half-open, so the 10:00 slot is free
        let taken = vec![TimeRange::new(540, 600)];
        let slots = free_slots(&taken, 60);
        assert!(slots.contains(&600));
        assert!(!slots.contains(&540));
    }

    #[test]
    fn slot_ending_past_close_discarded() {
        // 90-minute slots: the last start must leave room before 22:00
        let slots = free_slots(&[], 90);
        let last = *slots.last().unwrap();
        assert!(last + 90 <= DAY_CLOSE);
        assert_eq!(format_time(last), "20:30");
    }

    #[test]
    fn non_positive_slot_duration_yields_nothing() {
        assert!(free_slots(&[], 0).is_empty());
        assert!(free_slots(&[], -30).is_empty());
    }

    #[test]
    fn fully_booked_day_has_no_slots() {
        let taken = vec![TimeRange::new(DAY_OPEN, DAY_CLOSE)];
        assert!(free_slots(&taken, 30).is_empty());
    }

    #[test]
    fn thirty_minute_granularity() {
        let taken = vec![TimeRange::new(360, 390)]; // 06:00-06:30
        let slots = free_slots(&taken, 30);
        assert_eq!(slots.len(), 31);
        assert_eq!(format_time(slots[0]), "06:30");
    }
}
