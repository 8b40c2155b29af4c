use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{NewReservation, Reservation};

use super::{Engine, EngineError};

/// The narrow store contract the rest of the system is written against.
///
/// `create` must perform validation, conflict detection, and the write as a
/// single atomic unit per resource/day; `Engine` satisfies this by holding
/// the resource's write lock across all three. A networked or database
/// backend could implement the same trait with an exclusion constraint
/// instead.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn create(&self, input: NewReservation) -> Result<Reservation, EngineError>;

    async fn delete(&self, id: Ulid) -> Result<(), EngineError>;

    async fn list_by_month(&self, year: i32, month: u32) -> Result<Vec<Reservation>, EngineError>;

    async fn list_by_resource_and_date(
        &self,
        resource_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, EngineError>;
}

#[async_trait]
impl ReservationStore for Engine {
    async fn create(&self, input: NewReservation) -> Result<Reservation, EngineError> {
        Engine::create(self, input).await
    }

    async fn delete(&self, id: Ulid) -> Result<(), EngineError> {
        Engine::delete(self, id).await
    }

    async fn list_by_month(&self, year: i32, month: u32) -> Result<Vec<Reservation>, EngineError> {
        Engine::list_by_month(self, year, month).await
    }

    async fn list_by_resource_and_date(
        &self,
        resource_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, EngineError> {
        Engine::list_by_resource_and_date(self, resource_id, date).await
    }
}
