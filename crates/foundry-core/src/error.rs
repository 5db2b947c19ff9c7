//! Error types for Foundry Core
//!
//! Provides error handling for:
//! - Model backend failures (transient, retried by the orchestrator)
//! - Agent registry persistence
//! - Configuration parsing and validation
//! - Sandbox and history failures surfaced through the orchestrator
//!
//! A sentinel rejection is never an error: it is an unsafe
//! [`ScanReport`](foundry_sentinel::ScanReport) and drives the retry loop.

use foundry_sandbox::{HistoryError, SandboxError};
use std::path::PathBuf;

/// Main Foundry error type
#[derive(Debug, thiserror::Error)]
pub enum FoundryError {
    /// Path or file operation failed
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    /// Backup or restore failed
    #[error("history error: {0}")]
    History(#[from] HistoryError),

    /// Model backend failed
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Agent registry failed
    #[error("agent store error: {0}")]
    AgentStore(#[from] AgentStoreError),

    /// Configuration invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Project directory rejected
    #[error("invalid project directory: {}", .0.display())]
    InvalidProjectDir(PathBuf),
}

impl FoundryError {
    /// Is this a sandbox confinement failure?
    #[inline]
    #[must_use]
    pub fn is_violation(&self) -> bool {
        match self {
            Self::Sandbox(e) | Self::History(HistoryError::Sandbox(e)) => e.is_violation(),
            _ => false,
        }
    }
}

/// Model backend errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// Request failed before or during the call
    #[error("request failed: {0}")]
    Request(String),

    /// Stream broke after it started
    #[error("stream interrupted: {0}")]
    Stream(String),

    /// Backend rejected the model id
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// Backend rate limited the call
    #[error("rate limited")]
    RateLimited,
}

impl ModelError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Stream(_) | Self::RateLimited)
    }
}

/// Agent registry errors
#[derive(Debug, thiserror::Error)]
pub enum AgentStoreError {
    /// Registry file could not be read or written
    #[error("agent store io error on {}: {source}", .path.display())]
    Io {
        /// Registry path
        path: PathBuf,
        /// OS error
        #[source]
        source: std::io::Error,
    },

    /// Registry could not be serialized
    #[error("agent store serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Agent id already registered
    #[error("duplicate agent id: {0}")]
    DuplicateId(String),
}

impl AgentStoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        /// Config path
        path: PathBuf,
        /// OS error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}
