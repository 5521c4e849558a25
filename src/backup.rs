//! Point-in-time copies of the booking log, with age-based retention.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::engine::{Engine, EngineError};

const PREFIX: &str = "booking_backup_";
const EXTENSION: &str = ".wal";
const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S-%3f";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup directory: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot failed: {0}")]
    Snapshot(#[from] EngineError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub filename: String,
    pub size: u64,
    pub size_formatted: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatus {
    pub total_backups: usize,
    pub total_size: u64,
    pub total_size_formatted: String,
    pub latest_backup: Option<BackupInfo>,
    pub retention_days: u32,
    pub backups: Vec<BackupInfo>,
}

pub struct BackupManager {
    dir: PathBuf,
    retention_days: u32,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>, retention_days: u32) -> Self {
        Self {
            dir: dir.into(),
            retention_days,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// Snapshot the engine's log into a new timestamped file. Returns its name.
    pub async fn create(&self, engine: &Engine) -> Result<String, BackupError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // Claim the name with an empty file; the snapshot is renamed over it.
        let mut stamp = Utc::now();
        let (filename, path) = loop {
            let filename = backup_filename(stamp);
            let path = self.dir.join(&filename);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => break (filename, path),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    stamp += TimeDelta::milliseconds(1);
                }
                Err(e) => return Err(e.into()),
            }
        };

        let bytes = match engine.snapshot_to(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e.into());
            }
        };
        metrics::counter!(crate::observability::BACKUPS_TOTAL).increment(1);
        tracing::info!("backup {filename} written ({})", format_file_size(bytes));
        Ok(filename)
    }

    /// Snapshots in the backup directory, newest first. A missing directory is empty.
    pub async fn list(&self) -> Result<Vec<BackupInfo>, BackupError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().into_owned();
            if !filename.starts_with(PREFIX) || !filename.ends_with(EXTENSION) {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("skipping backup {filename}: {e}");
                    continue;
                }
            };
            let created_at = match parse_backup_time(&filename) {
                Some(t) => t,
                None => match meta.modified() {
                    Ok(t) => DateTime::<Utc>::from(t),
                    Err(_) => continue,
                },
            };
            backups.push(BackupInfo {
                size: meta.len(),
                size_formatted: format_file_size(meta.len()),
                created_at,
                path: entry.path(),
                filename,
            });
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.filename.cmp(&a.filename)));
        Ok(backups)
    }

    /// Delete snapshots older than the retention window. Returns how many went.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<usize, BackupError> {
        let cutoff = now - TimeDelta::days(i64::from(self.retention_days));
        let mut deleted = 0;
        for backup in self.list().await? {
            if backup.created_at >= cutoff {
                continue;
            }
            match tokio::fs::remove_file(&backup.path).await {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!("failed to delete backup {}: {e}", backup.filename),
            }
        }
        if deleted > 0 {
            tracing::info!("deleted {deleted} backup(s) older than {} days", self.retention_days);
        }
        Ok(deleted)
    }

    pub async fn status(&self) -> Result<BackupStatus, BackupError> {
        let backups = self.list().await?;
        let total_size: u64 = backups.iter().map(|b| b.size).sum();
        Ok(BackupStatus {
            total_backups: backups.len(),
            total_size,
            total_size_formatted: format_file_size(total_size),
            latest_backup: backups.first().cloned(),
            retention_days: self.retention_days,
            backups,
        })
    }
}

fn backup_filename(at: DateTime<Utc>) -> String {
    format!("{PREFIX}{}{EXTENSION}", at.format(STAMP_FORMAT))
}

fn parse_backup_time(filename: &str) -> Option<DateTime<Utc>> {
    let stamp = filename.strip_prefix(PREFIX)?.strip_suffix(EXTENSION)?;
    NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

/// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2.25 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}
