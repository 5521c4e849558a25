use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::backup::BackupError;
use crate::booking::BookingError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("{0}")]
    BadRequest(String),

    #[error("wrong admin password")]
    Forbidden,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

const TRY_AGAIN: &str = "something went wrong, please try again later";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            ApiError::Booking(BookingError::Validation { field, .. }) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": message, "field": field.as_str() }),
            ),
            ApiError::Booking(BookingError::Conflict { conflicts }) => (
                StatusCode::CONFLICT,
                json!({ "success": false, "message": message, "conflicts": conflicts }),
            ),
            ApiError::Booking(BookingError::Forbidden) | ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "success": false, "message": message }),
            ),
            ApiError::Booking(BookingError::NotFound) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "message": message }),
            ),
            ApiError::Booking(BookingError::PastDate) | ApiError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": message }),
            ),
            ApiError::Booking(BookingError::Capacity(reason)) => {
                tracing::warn!("booking refused: {reason}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "success": false, "message": message }),
                )
            }
            ApiError::Booking(BookingError::Storage(e)) => {
                tracing::error!("storage failure: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": TRY_AGAIN }),
                )
            }
            ApiError::Backup(e) => {
                tracing::error!("backup failure: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": TRY_AGAIN }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
