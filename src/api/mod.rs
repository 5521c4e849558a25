//! HTTP surface: JSON routes over the booking service and backup manager.

mod backup;
mod bookings;
mod error;

pub use error::ApiError;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::backup::BackupManager;
use crate::booking::BookingService;
use crate::engine::Engine;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BookingService>,
    pub backups: Arc<BackupManager>,
    pub engine: Arc<Engine>,
    /// `None` disables the admin clear endpoint.
    pub admin_password: Option<Arc<str>>,
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.trim().parse().ok())
        .collect();

    Router::new()
        .route("/health", get(health))
        .route("/booking/create", post(bookings::create_booking))
        .route("/booking/delete", axum::routing::delete(bookings::delete_booking))
        .route("/bookings", get(bookings::list_bookings))
        .route("/bookings/recurring-count", get(bookings::recurring_count))
        .route(
            "/backup",
            post(backup::create_backup)
                .get(backup::list_backups)
                .delete(backup::cleanup_backups),
        )
        .route("/backup-status", get(backup::backup_status))
        .route("/admin/clear-bookings", post(bookings::clear_bookings))
        .with_state(state)
        .layer(middleware::from_fn(crate::observability::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE]),
        )
}

async fn health() -> &'static str {
    "ok"
}
