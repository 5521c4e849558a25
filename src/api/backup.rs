use axum::{Json, extract::State};
use serde_json::json;

use super::{ApiError, AppState};

pub async fn create_backup(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let filename = state.backups.create(&state.engine).await?;
    Ok(Json(json!({
        "success": true,
        "message": "backup created",
        "filename": filename,
    })))
}

pub async fn list_backups(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let backups = state.backups.list().await?;
    Ok(Json(json!({ "success": true, "backups": backups })))
}

pub async fn cleanup_backups(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state.backups.cleanup(chrono::Utc::now()).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("cleanup finished, {deleted} old backup(s) deleted"),
        "deletedCount": deleted,
    })))
}

pub async fn backup_status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let status = state.backups.status().await?;
    Ok(Json(json!(status)))
}
