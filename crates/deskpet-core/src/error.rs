//! Error handling for deskpet
//!
//! Provides the error types of the core crate:
//! - Event bus errors (throttle validation, async queue, worker threads)
//! - Configuration errors (loading, parsing, saving)
//!
//! Handler failures are not errors of the bus. They are captured and logged
//! at the point of invocation and never surface to the emitting caller.
//!
//! All error types use `thiserror` for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

/// Event bus error type
#[derive(Error, Debug)]
pub enum EventBusError {
    /// Throttle interval is not a positive, finite number of seconds
    #[error("Invalid throttle interval: {seconds}s")]
    InvalidThrottleInterval {
        /// The rejected interval in seconds.
        seconds: f64,
    },

    /// Async intake queue stayed full for the whole enqueue timeout
    #[error("Async queue is full ({capacity} pending jobs)")]
    QueueFull {
        /// The configured queue capacity.
        capacity: usize,
    },

    /// A worker thread could not be spawned
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// A configuration value is invalid
    #[error("Invalid setting '{key}': {reason}")]
    InvalidConfig {
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Configuration file error type
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("Config file {path}: {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file extension is neither `.toml` nor `.json`
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// TOML deserialization error
    #[error("Invalid TOML config: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("Failed to serialize config: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// JSON serialization/deserialization error
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Main error type for deskpet-core
#[derive(Error, Debug)]
pub enum Error {
    /// Event bus error
    #[error(transparent)]
    EventBus(#[from] EventBusError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is an event bus error
    pub fn is_event_bus_error(&self) -> bool {
        matches!(self, Error::EventBus(_))
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::EventBus(EventBusError::InvalidConfig { .. })
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
