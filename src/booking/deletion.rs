use chrono::NaiveDate;

use crate::model::BookingId;
use crate::repository::BookingRepository;

use super::BookingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Single { booking_id: BookingId },
    Group { group_id: String, deleted: usize },
}

impl DeleteOutcome {
    pub fn deleted_count(&self) -> usize {
        match self {
            DeleteOutcome::Single { .. } => 1,
            DeleteOutcome::Group { deleted, .. } => *deleted,
        }
    }
}

/// Delete one booking, or with `delete_all` every member of its recurring
/// group dated `today` or later. Checks run in order: existence, extension,
/// past date.
pub async fn resolve_delete(
    repo: &dyn BookingRepository,
    booking_id: BookingId,
    extension: &str,
    delete_all: bool,
    today: NaiveDate,
) -> Result<DeleteOutcome, BookingError> {
    let booking = repo
        .get_by_id(booking_id)
        .await?
        .ok_or(BookingError::NotFound)?;

    if booking.extension != extension.trim() {
        tracing::info!("delete of booking {booking_id} refused: extension mismatch");
        return Err(BookingError::Forbidden);
    }
    if booking.date < today {
        return Err(BookingError::PastDate);
    }

    match booking.recurring_group_id {
        Some(group_id) if delete_all => {
            let deleted = repo.delete_group_from(&group_id, today).await?;
            tracing::info!("deleted {deleted} booking(s) of group {group_id} from {today}");
            Ok(DeleteOutcome::Group { group_id, deleted })
        }
        _ => {
            if !repo.delete(booking_id).await? {
                return Err(BookingError::NotFound);
            }
            tracing::info!("deleted booking {booking_id}");
            Ok(DeleteOutcome::Single { booking_id })
        }
    }
}

/// Members of a recurring group dated `today` or later.
pub async fn active_group_count(
    repo: &dyn BookingRepository,
    group_id: &str,
    today: NaiveDate,
) -> Result<usize, BookingError> {
    Ok(repo.count_group_from(group_id, today).await?)
}
