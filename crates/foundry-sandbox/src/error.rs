//! Error types for the sandbox
//!
//! Provides error handling for:
//! - Path confinement (resolution outside every registered root)
//! - File operations (missing targets, directory targets, I/O)
//! - Version history (missing versions, backup I/O)

use std::path::PathBuf;

/// Errors from [`FileStore`](crate::FileStore) operations
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Resolved path is outside every registered root
    #[error("access denied: {} is not inside any approved root ({})", .path.display(), format_roots(.roots))]
    SandboxViolation {
        /// Path as supplied by the caller
        path: PathBuf,
        /// Registered roots at the time of the check
        roots: Vec<PathBuf>,
    },

    /// Target does not exist
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Target is not a regular file
    #[error("not a file: {}", .0.display())]
    InvalidTarget(PathBuf),

    /// Underlying I/O failure
    #[error("io error on {}: {source}", .path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// OS error
        #[source]
        source: std::io::Error,
    },
}

impl SandboxError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Is this a confinement failure?
    #[inline]
    #[must_use]
    pub fn is_violation(&self) -> bool {
        matches!(self, Self::SandboxViolation { .. })
    }
}

/// Errors from [`HistoryStore`](crate::HistoryStore) operations
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Path failed the sandbox check
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// Requested version is not in the backup series
    #[error("version {version_id} not found for {}", .path.display())]
    VersionNotFound {
        /// Original file
        path: PathBuf,
        /// Requested version id
        version_id: String,
    },

    /// I/O failure while copying or pruning backups
    #[error("history io error on {}: {source}", .path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// OS error
        #[source]
        source: std::io::Error,
    },
}

impl HistoryError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for sandbox operations
pub type SandboxResult<T> = Result<T, SandboxError>;

fn format_roots(roots: &[PathBuf]) -> String {
    roots
        .iter()
        .map(|r| r.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
