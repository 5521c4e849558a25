use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

use crate::backup::BackupManager;
use crate::engine::Engine;

const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Background task that compacts the WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        compact_if_due(&engine, threshold).await;
    }
}

/// One compactor pass. Returns whether the log was rewritten.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => {
            info!("compacted WAL after {appends} appends");
            true
        }
        Err(e) => {
            tracing::error!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task that snapshots the log every `every`, then prunes expired snapshots.
/// The first snapshot is one full interval after startup.
pub async fn run_backups(manager: Arc<BackupManager>, engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        backup_pass(&manager, &engine).await;
    }
}

pub async fn backup_pass(manager: &BackupManager, engine: &Engine) {
    match manager.create(engine).await {
        Ok(filename) => info!("scheduled backup {filename} created"),
        Err(e) => tracing::error!("scheduled backup failed: {e}"),
    }
    if let Err(e) = manager.cleanup(chrono::Utc::now()).await {
        tracing::error!("backup cleanup failed: {e}");
    }
}
