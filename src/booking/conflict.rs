use chrono::NaiveDate;

use crate::model::{Booking, RoomId};
use crate::repository::BookingRepository;

use super::BookingError;

/// Bookings in `room_id` on `date` whose slot is exactly `time_slot`.
/// Partially overlapping slots are different slots.
pub async fn find_conflicts(
    repo: &dyn BookingRepository,
    room_id: RoomId,
    date: NaiveDate,
    time_slot: &str,
) -> Result<Vec<Booking>, BookingError> {
    let day = repo.get_by_room_and_date(room_id, date).await?;
    Ok(day.into_iter().filter(|b| b.time_slot == time_slot).collect())
}

/// Gate a creation: occupied slots need `force`.
pub async fn check_slot(
    repo: &dyn BookingRepository,
    room_id: RoomId,
    date: NaiveDate,
    time_slot: &str,
    force: bool,
) -> Result<(), BookingError> {
    if force {
        return Ok(());
    }
    let conflicts = find_conflicts(repo, room_id, date, time_slot).await?;
    if conflicts.is_empty() {
        return Ok(());
    }
    metrics::counter!(crate::observability::CONFLICTS_TOTAL).increment(1);
    tracing::debug!(
        "slot {room_id} {date} {time_slot} held by {} booking(s)",
        conflicts.len()
    );
    Err(BookingError::Conflict { conflicts })
}
