use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::validate::ExtensionPolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub backup_retention_days: u32,
    pub backup_interval: Duration,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    /// Empty admits any well-formed extension.
    pub allowed_extensions: Vec<String>,
    /// Unset disables the admin clear endpoint.
    pub admin_password: Option<String>,
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let parsed = |key: &str| -> Option<String> {
            var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            bind: parsed("ROOMDESK_BIND").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed("ROOMDESK_PORT")
                .map(|v| v.parse::<u16>().context("ROOMDESK_PORT must be a port number"))
                .transpose()?
                .unwrap_or(3000),
            data_dir: parsed("ROOMDESK_DATA_DIR")
                .unwrap_or_else(|| "./data".to_string())
                .into(),
            backup_dir: parsed("ROOMDESK_BACKUP_DIR")
                .unwrap_or_else(|| "./backups".to_string())
                .into(),
            backup_retention_days: parsed("ROOMDESK_BACKUP_RETENTION_DAYS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            backup_interval: Duration::from_secs(
                parsed("ROOMDESK_BACKUP_INTERVAL_SECS")
                    .and_then(|v| v.parse::<u64>().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(86_400),
            ),
            compact_threshold: parsed("ROOMDESK_COMPACT_THRESHOLD")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            metrics_port: parsed("ROOMDESK_METRICS_PORT").and_then(|v| v.parse().ok()),
            allowed_extensions: split_list(parsed("ROOMDESK_ALLOWED_EXTENSIONS")),
            admin_password: parsed("ROOMDESK_ADMIN_PASSWORD"),
            allowed_origins: parsed("ROOMDESK_ALLOWED_ORIGINS")
                .map(|v| split_list(Some(v)))
                .unwrap_or_else(|| vec!["http://localhost:3000".to_string()]),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }

    pub fn extension_policy(&self) -> ExtensionPolicy {
        ExtensionPolicy::allow_list(self.allowed_extensions.iter().cloned())
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}
