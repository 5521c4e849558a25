use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roomdesk::api::{AppState, build_router};
use roomdesk::backup::BackupManager;
use roomdesk::booking::BookingService;
use roomdesk::config::Config;
use roomdesk::engine::Engine;
use roomdesk::scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    roomdesk::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;
    let engine = Arc::new(Engine::new(config.wal_path())?);

    let backups = Arc::new(BackupManager::new(
        config.backup_dir.clone(),
        config.backup_retention_days,
    ));
    let service = Arc::new(BookingService::new(engine.clone(), config.extension_policy()));

    let compactor_engine = engine.clone();
    let threshold = config.compact_threshold;
    tokio::spawn(async move {
        scheduler::run_compactor(compactor_engine, threshold).await;
    });
    let backup_manager = backups.clone();
    let backup_engine = engine.clone();
    let every = config.backup_interval;
    tokio::spawn(async move {
        scheduler::run_backups(backup_manager, backup_engine, every).await;
    });

    let state = AppState {
        service,
        backups,
        engine,
        admin_password: config.admin_password.as_deref().map(Arc::from),
    };
    let app = build_router(state, &config.allowed_origins);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("roomdesk listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!(
        "  backups: {} every {}s, kept {} days",
        config.backup_dir.display(),
        config.backup_interval.as_secs(),
        config.backup_retention_days
    );
    info!(
        "  admin clear: {}",
        if config.admin_password.is_some() { "enabled" } else { "disabled" }
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("roomdesk stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM; in-flight requests drain before `serve` returns.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received, draining requests");
}
