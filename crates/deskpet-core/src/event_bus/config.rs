//! Event bus configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Files may be TOML or JSON, chosen by extension.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, Error, EventBusError, Result};

/// Configuration for the event bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Capacity of the async intake queue.
    pub queue_capacity: usize,
    /// Number of threads executing async handlers.
    pub worker_threads: usize,
    /// Timed-poll interval of the intake loop and workers, in milliseconds.
    pub poll_interval_ms: u64,
    /// Bounded wait when joining worker threads on `stop`, in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// How long `emit` waits on a full async queue before dropping, in milliseconds.
    pub enqueue_timeout_ms: u64,
    /// Capacity of the broadcast tap.
    pub tap_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            worker_threads: 4,
            poll_interval_ms: 100,
            shutdown_timeout_ms: 1000,
            enqueue_timeout_ms: 50,
            tap_capacity: 256,
        }
    }
}

impl EventBusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), EventBusError> {
        let checks = [
            ("queue_capacity", self.queue_capacity == 0),
            ("worker_threads", self.worker_threads == 0),
            ("poll_interval_ms", self.poll_interval_ms == 0),
            ("tap_capacity", self.tap_capacity == 0),
        ];
        if let Some((key, _)) = checks.iter().find(|(_, invalid)| *invalid) {
            return Err(EventBusError::InvalidConfig {
                key: key.to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = match extension(path)? {
            Format::Json => serde_json::from_str(&content).map_err(ConfigError::from)?,
            Format::Toml => toml::from_str(&content).map_err(ConfigError::from)?,
        };

        config.validate()?;
        tracing::debug!("Loaded event bus config from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = match extension(path)? {
            Format::Json => serde_json::to_string_pretty(self).map_err(ConfigError::from)?,
            Format::Toml => toml::to_string_pretty(self).map_err(ConfigError::from)?,
        };

        std::fs::write(path, content).map_err(|source| {
            Error::from(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        })
    }
}

enum Format {
    Json,
    Toml,
}

fn extension(path: &Path) -> Result<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("<none>").to_string()).into()),
    }
}
