use async_trait::async_trait;
use chrono::NaiveDate;

use crate::engine::{Engine, EngineError};
use crate::model::*;

/// Storage seen by the booking service.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persist with a fresh id, the next order index in its slot, and a creation timestamp.
    async fn create(&self, booking: NewBooking) -> Result<Booking, EngineError>;

    async fn get_by_id(&self, id: BookingId) -> Result<Option<Booking>, EngineError>;

    /// Ordered by time slot, then order index.
    async fn get_by_room_and_date(&self, room_id: RoomId, date: NaiveDate) -> Result<Vec<Booking>, EngineError>;

    /// Ordered by date, time slot, order index.
    async fn list(&self, room_id: RoomId, filter: DateFilter) -> Result<Vec<Booking>, EngineError>;

    /// `Ok(false)` when no booking has this id.
    async fn delete(&self, id: BookingId) -> Result<bool, EngineError>;

    async fn delete_group_from(&self, group_id: &str, from: NaiveDate) -> Result<usize, EngineError>;

    async fn count_group_from(&self, group_id: &str, from: NaiveDate) -> Result<usize, EngineError>;

    async fn clear(&self) -> Result<usize, EngineError>;
}

#[async_trait]
impl BookingRepository for Engine {
    async fn create(&self, booking: NewBooking) -> Result<Booking, EngineError> {
        self.insert_booking(booking).await
    }

    async fn get_by_id(&self, id: BookingId) -> Result<Option<Booking>, EngineError> {
        Ok(self.get_booking(id).await)
    }

    async fn get_by_room_and_date(&self, room_id: RoomId, date: NaiveDate) -> Result<Vec<Booking>, EngineError> {
        Ok(self.day_bookings(room_id, date).await)
    }

    async fn list(&self, room_id: RoomId, filter: DateFilter) -> Result<Vec<Booking>, EngineError> {
        Ok(self.list_bookings(room_id, filter).await)
    }

    async fn delete(&self, id: BookingId) -> Result<bool, EngineError> {
        self.remove_booking(id).await
    }

    async fn delete_group_from(&self, group_id: &str, from: NaiveDate) -> Result<usize, EngineError> {
        self.remove_group_from(group_id, from).await
    }

    async fn count_group_from(&self, group_id: &str, from: NaiveDate) -> Result<usize, EngineError> {
        Ok(Engine::count_group_from(self, group_id, from))
    }

    async fn clear(&self) -> Result<usize, EngineError> {
        self.clear_all().await
    }
}
