use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests. Labels: method, route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "roomdesk_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: method, route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "roomdesk_http_request_duration_seconds";

// ── Booking activity ────────────────────────────────────────────

/// Counter: bookings persisted.
pub const BOOKINGS_CREATED_TOTAL: &str = "roomdesk_bookings_created_total";

/// Counter: bookings removed, singly, by group, or by clear.
pub const BOOKINGS_DELETED_TOTAL: &str = "roomdesk_bookings_deleted_total";

/// Counter: creations refused because the slot was taken.
pub const CONFLICTS_TOTAL: &str = "roomdesk_conflicts_total";

/// Counter: backup snapshots written.
pub const BACKUPS_TOTAL: &str = "roomdesk_backups_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomdesk_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomdesk_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> anyhow::Result<()> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Axum middleware recording request count and latency per matched route.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    // Route template, not the raw path, to keep label cardinality bounded.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "route" => route.clone(), "status" => status)
        .increment(1);
    metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "route" => route)
        .record(start.elapsed().as_secs_f64());
    response
}
