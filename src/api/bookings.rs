use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::booking::{BookingRequest, CreateOutcome};
use crate::model::{BookingId, today};

use super::{ApiError, AppState};

pub async fn create_booking(
    State(state): State<AppState>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let body = match state.service.create(req, today()).await? {
        CreateOutcome::Single(booking) => json!({
            "success": true,
            "message": "booking created",
            "booking": booking,
        }),
        CreateOutcome::Series(report) => {
            let message = if report.is_complete() {
                format!("recurring booking created: {} occurrences", report.bookings.len())
            } else {
                format!(
                    "recurring booking partially created: {} of {} occurrences",
                    report.bookings.len(),
                    report.requested
                )
            };
            json!({
                "success": true,
                "message": message,
                "recurringGroupId": report.group_id,
                "requested": report.requested,
                "created": report.bookings.len(),
                "bookings": report.bookings,
            })
        }
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub booking_id: BookingId,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub delete_all: bool,
}

pub async fn delete_booking(
    State(state): State<AppState>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = payload?;
    if req.extension.trim().is_empty() {
        return Err(ApiError::BadRequest("extension is required".into()));
    }
    let outcome = state
        .service
        .delete(req.booking_id, &req.extension, req.delete_all, today())
        .await?;
    let deleted = outcome.deleted_count();
    Ok(Json(json!({
        "success": true,
        "message": format!("{deleted} booking(s) deleted"),
        "deletedCount": deleted,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub room_id: Option<String>,
    pub date: Option<String>,
}

pub async fn list_bookings(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = params?;
    let bookings = state
        .service
        .list(params.room_id.as_deref().unwrap_or_default(), params.date.as_deref())
        .await?;
    Ok(Json(json!({ "bookings": bookings })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountParams {
    pub group_id: Option<String>,
}

pub async fn recurring_count(
    State(state): State<AppState>,
    params: Result<Query<CountParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = params?;
    let count = state
        .service
        .recurring_count(params.group_id.as_deref().unwrap_or_default(), today())
        .await?;
    Ok(Json(json!({ "count": count })))
}

#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    pub password: String,
}

/// Drop every booking. Disabled unless an admin password is configured.
pub async fn clear_bookings(
    State(state): State<AppState>,
    payload: Result<Json<ClearRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = payload?;
    match state.admin_password.as_deref() {
        Some(expected) if expected == req.password => {}
        _ => {
            tracing::warn!("admin clear refused");
            return Err(ApiError::Forbidden);
        }
    }
    let deleted = state.service.clear().await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("{deleted} booking(s) deleted"),
        "deletedCount": deleted,
    })))
}
