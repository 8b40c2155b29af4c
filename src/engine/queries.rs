use chrono::NaiveDate;

use crate::limits::MIN_SLOT_MINUTES;
use crate::model::*;

use super::availability::free_slots;
use super::{Engine, EngineError};

impl Engine {
    /// All reservations whose date falls within the given calendar month.
    /// Order is unspecified; display callers sort by start time.
    pub async fn list_by_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<Reservation>, EngineError> {
        if !(1..=12).contains(&month) {
            return Err(EngineError::InvalidInput("month must be 1-12"));
        }
        let mut out = Vec::new();
        for book in self.books_snapshot() {
            let guard = book.read().await;
            out.extend(guard.in_month(year, month).cloned());
        }
        Ok(out)
    }

    /// Reservations for one resource on one day, sorted by start time.
    pub async fn list_by_resource_and_date(
        &self,
        resource_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, EngineError> {
        let book = self
            .book(resource_id)
            .ok_or_else(|| EngineError::UnknownResource(resource_id.to_string()))?;
        let guard = book.read().await;
        Ok(guard.on_date(date).to_vec())
    }

    pub async fn list_all(&self) -> Vec<Reservation> {
        let mut out = Vec::new();
        for book in self.books_snapshot() {
            let guard = book.read().await;
            out.extend(guard.iter().cloned());
        }
        out
    }

    /// Free slot start times ("HH:MM") for a resource on a date, at the
    /// given granularity, within the 06:00-22:00 operating window.
    pub async fn available_slots(
        &self,
        resource_id: &str,
        date: NaiveDate,
        slot_minutes: Minutes,
    ) -> Result<Vec<String>, EngineError> {
        if slot_minutes < MIN_SLOT_MINUTES {
            return Err(EngineError::InvalidInput("slot duration too fine"));
        }
        let book = self
            .book(resource_id)
            .ok_or_else(|| EngineError::UnknownResource(resource_id.to_string()))?;
        let guard = book.read().await;
        let taken: Vec<TimeRange> = guard.on_date(date).iter().map(|r| r.range).collect();
        Ok(free_slots(&taken, slot_minutes)
            .into_iter()
            .map(format_time)
            .collect())
    }
}
