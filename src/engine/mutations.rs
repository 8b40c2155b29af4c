use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{SlotCandidate, find_conflict, now_ms, validate_range};
use super::error::ConflictDetails;
use super::{Engine, EngineError};

impl Engine {
    /// Validated creation path: registry check, temporal validation,
    /// conflict detection, and the write — all under the resource's write
    /// lock, so the check and the insert are one atomic unit.
    pub async fn create(&self, input: NewReservation) -> Result<Reservation, EngineError> {
        let resource = self
            .catalog
            .get(&input.resource_id)
            .ok_or_else(|| EngineError::UnknownResource(input.resource_id.clone()))?;
        if resource.kind != input.kind {
            return Err(EngineError::KindMismatch {
                resource_id: input.resource_id.clone(),
                expected: resource.kind,
                got: input.kind,
            });
        }
        if input.reserved_by.trim().is_empty() {
            return Err(EngineError::InvalidInput("reserved_by must not be empty"));
        }
        if input.reserved_by.len() > MAX_RESERVED_BY_LEN {
            return Err(EngineError::LimitExceeded("reserved_by too long"));
        }
        if input.purpose.len() > MAX_PURPOSE_LEN {
            return Err(EngineError::LimitExceeded("purpose too long"));
        }
        validate_range(&input.range)?;

        let book = self
            .book(&input.resource_id)
            .ok_or_else(|| EngineError::UnknownResource(input.resource_id.clone()))?;
        let mut guard = book.write().await;

        if guard.day_count(input.date) >= MAX_RESERVATIONS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many reservations on this day"));
        }

        let candidate = SlotCandidate {
            resource_id: &input.resource_id,
            date: input.date,
            range: input.range,
        };
        if let Some(hit) = find_conflict(&candidate, guard.on_date(input.date), None) {
            metrics::counter!(crate::observability::CONFLICTS_TOTAL).increment(1);
            return Err(EngineError::Conflict(ConflictDetails {
                id: hit.id,
                range: hit.range,
                reserved_by: hit.reserved_by.clone(),
            }));
        }

        let reservation = Reservation {
            id: Ulid::new(),
            kind: input.kind,
            resource_id: input.resource_id,
            date: input.date,
            range: input.range,
            reserved_by: input.reserved_by,
            purpose: input.purpose,
            created_at: now_ms(),
        };
        let event = Event::ReservationCreated {
            reservation: reservation.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(reservation)
    }

    /// Delete by id. Repeated delete of an absent id is always `NotFound`,
    /// never silently successful.
    pub async fn delete(&self, id: Ulid) -> Result<(), EngineError> {
        let resource_id = self
            .resource_for_reservation(&id)
            .ok_or(EngineError::NotFound(id))?;
        let book = self
            .book(&resource_id)
            .ok_or(EngineError::NotFound(id))?;
        let mut guard = book.write().await;

        // The index lookup above raced with nothing holding the lock —
        // re-check under it.
        if !guard.contains(id) {
            return Err(EngineError::NotFound(id));
        }

        let event = Event::ReservationDeleted { id, resource_id };
        self.persist_and_apply(&mut guard, &event).await
    }
}
