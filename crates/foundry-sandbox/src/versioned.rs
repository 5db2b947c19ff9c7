//! File store with backup-before-overwrite

use crate::error::HistoryError;
use crate::history::{BackupEntry, HistoryStore};
use crate::store::FileStore;
use std::path::Path;
use std::sync::Arc;

/// [`FileStore`] plus an optional [`HistoryStore`]
#[derive(Debug, Clone)]
pub struct VersionedStore {
    files: Arc<FileStore>,
    history: Option<HistoryStore>,
}

impl VersionedStore {
    /// Store without history
    #[inline]
    #[must_use]
    pub fn new(files: Arc<FileStore>) -> Self {
        Self {
            files,
            history: None,
        }
    }

    /// Store that backs up before every overwrite
    #[inline]
    #[must_use]
    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    /// Underlying file store
    #[inline]
    #[must_use]
    pub fn files(&self) -> &Arc<FileStore> {
        &self.files
    }

    /// History store, if enabled
    #[inline]
    #[must_use]
    pub fn history(&self) -> Option<&HistoryStore> {
        self.history.as_ref()
    }

    /// Write `content`, backing up the existing file first
    ///
    /// The backup copy and pruning run on the blocking pool. Returns the backup entry when an existing file was versioned.
    ///
    /// # Errors
    /// `HistoryError::Sandbox` for path failures; `HistoryError::Io` if the
    /// backup cannot be taken, in which case nothing is written
    pub async fn write_versioned(
        &self,
        path: impl AsRef<Path>,
        content: &str,
    ) -> Result<Option<BackupEntry>, HistoryError> {
        let resolved = self.files.resolve(path)?;
        let backup = match &self.history {
            Some(history) => {
                let history = history.clone();
                let source = resolved.clone();
                tokio::task::spawn_blocking(move || history.create_backup(&source))
                    .await
                    .map_err(|e| HistoryError::io_error(&resolved, std::io::Error::other(e)))??
            }
            None => None,
        };
        self.files.write(&resolved, content).await?;
        Ok(backup)
    }
}
