//! Foundry Sandbox
//!
//! Path-confined file access over a dynamic set of approved roots, with a
//! bounded per-file backup history.
//!
//! # Core Concepts
//!
//! - [`FileStore`]: Resolves every path and rejects anything outside the roots
//! - [`HistoryStore`]: Backs up a file before it is overwritten
//! - [`VersionedStore`]: Both of the above behind one write call
//!
//! # Example
//!
//! ```rust,no_run
//! use foundry_sandbox::{FileStore, HistoryStore, VersionedStore};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let files = Arc::new(FileStore::new("/tmp/project")?);
//! let store = VersionedStore::new(Arc::clone(&files))
//!     .with_history(HistoryStore::new(Arc::clone(&files), 10));
//!
//! store.write_versioned("app.py", "x = 1\n").await?;
//! let backup = store.write_versioned("app.py", "x = 2\n").await?;
//! assert!(backup.is_some());
//!
//! assert!(files.read("../etc/passwd").await.is_err());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
mod error;
mod history;
mod path;
mod store;
mod versioned;

// Re-exports
pub use error::{HistoryError, SandboxError, SandboxResult};
pub use history::{BackupEntry, HistoryStore, DEFAULT_HISTORY_DIR, DEFAULT_MAX_BACKUPS};
pub use path::{canonicalize_existing_prefix, display_relative, is_within, normalize_lexically};
pub use store::{FileStore, DEFAULT_LIST_DEPTH, EXCLUDED_DIRS, LISTED_EXTENSIONS};
pub use versioned::VersionedStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
