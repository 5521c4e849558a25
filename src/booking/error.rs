use thiserror::Error;

use crate::engine::EngineError;
use crate::model::Booking;

/// Which request field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    RoomId,
    Date,
    TimeSlot,
    Booker,
    Extension,
    Title,
    Recurring,
    GroupId,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::RoomId => "roomId",
            Field::Date => "date",
            Field::TimeSlot => "timeSlot",
            Field::Booker => "booker",
            Field::Extension => "extension",
            Field::Title => "title",
            Field::Recurring => "recurring",
            Field::GroupId => "groupId",
        }
    }
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{message}")]
    Validation { field: Field, message: &'static str },

    #[error("this time slot is already booked; confirm to book it anyway")]
    Conflict { conflicts: Vec<Booking> },

    #[error("extension does not match this booking")]
    Forbidden,

    #[error("booking not found")]
    NotFound,

    #[error("past bookings cannot be changed")]
    PastDate,

    /// A hard cap was reached; retrying will not help.
    #[error("{0}")]
    Capacity(&'static str),

    #[error("storage failure: {0}")]
    Storage(EngineError),
}

impl From<EngineError> for BookingError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::LimitExceeded(reason) => BookingError::Capacity(reason),
            e => BookingError::Storage(e),
        }
    }
}

impl BookingError {
    pub fn invalid(field: Field, message: &'static str) -> Self {
        BookingError::Validation { field, message }
    }
}
