//! Version history
//!
//! Before an overwrite, the current file is copied to
//! `<primary>/.history/<relative-dir>/<file>_<unix-seconds>.bak`. Each series
//! keeps at most `max_backups` entries; the oldest by mtime are pruned first.
//!
//! Only files under the primary root are versioned.

use crate::error::HistoryError;
use crate::path::display_relative;
use crate::store::FileStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default history directory name under the primary root
pub const DEFAULT_HISTORY_DIR: &str = ".history";

/// Default number of retained backups per file
pub const DEFAULT_MAX_BACKUPS: usize = 10;

const BACKUP_EXT: &str = ".bak";

/// One retained prior version of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Version id (the unix timestamp as a string)
    pub version_id: String,
    /// Unix timestamp in seconds
    pub timestamp: u64,
    /// Local display date, `%Y-%m-%d %H:%M:%S`
    pub date: String,
    /// Backup file location
    pub path: PathBuf,
    /// Original file, relative to the primary root
    pub original: String,
}

/// Per-file backup series under the primary root
#[derive(Debug, Clone)]
pub struct HistoryStore {
    files: Arc<FileStore>,
    history_dir: PathBuf,
    max_backups: usize,
}

impl HistoryStore {
    /// History store for `files` keeping `max_backups` versions per file
    ///
    /// A cap of zero is treated as one.
    #[must_use]
    pub fn new(files: Arc<FileStore>, max_backups: usize) -> Self {
        let history_dir = files.primary_root().join(DEFAULT_HISTORY_DIR);
        Self {
            files,
            history_dir,
            max_backups: max_backups.max(1),
        }
    }

    /// Use a different directory name under the primary root
    #[inline]
    #[must_use]
    pub fn with_dir_name(mut self, name: impl AsRef<Path>) -> Self {
        self.history_dir = self.files.primary_root().join(name);
        self
    }

    /// Retention cap
    #[inline]
    #[must_use]
    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// History directory
    #[inline]
    #[must_use]
    pub fn history_dir(&self) -> &Path {
        &self.history_dir
    }

    /// Copy the current file into its backup series
    ///
    /// Returns `None` when there is nothing to back up (missing file, not a
    /// regular file, or outside the primary root).
    ///
    /// # Errors
    /// - `HistoryError::Sandbox` if the path is outside every root
    /// - `HistoryError::Io` if the copy or pruning fails
    pub fn create_backup(&self, path: impl AsRef<Path>) -> Result<Option<BackupEntry>, HistoryError> {
        let Some(series) = self.series(path.as_ref())? else {
            return Ok(None);
        };
        if !series.source.is_file() {
            return Ok(None);
        }

        std::fs::create_dir_all(&series.dir)
            .map_err(|e| HistoryError::io_error(&series.dir, e))?;

        let mut timestamp = unix_now();
        while series.backup_path(timestamp).exists() {
            timestamp += 1;
        }
        let backup = series.backup_path(timestamp);
        copy_preserving_mtime(&series.source, &backup, &series.dir)?;

        tracing::info!(
            file = %series.original,
            backup = %backup.display(),
            "backup created"
        );

        let pruned = self.prune(&series)?;
        if pruned > 0 {
            tracing::info!(file = %series.original, pruned, "old backups pruned");
        }

        Ok(Some(series.entry(timestamp, backup)))
    }

    /// Retained versions of a file, newest first
    ///
    /// # Errors
    /// `HistoryError::Sandbox` if the path is outside every root
    pub fn history(&self, path: impl AsRef<Path>) -> Result<Vec<BackupEntry>, HistoryError> {
        let Some(series) = self.series(path.as_ref())? else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<BackupEntry> = series
            .members()?
            .into_iter()
            .map(|(timestamp, backup)| series.entry(timestamp, backup))
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    /// Restore a file to a retained version
    ///
    /// The current content is backed up first, so a restore can itself be undone.
    ///
    /// # Errors
    /// - `HistoryError::VersionNotFound` if no such version is retained
    /// - `HistoryError::Sandbox` / `HistoryError::Io` on path or copy failure
    pub fn restore(
        &self,
        path: impl AsRef<Path>,
        version_id: &str,
    ) -> Result<PathBuf, HistoryError> {
        let path = path.as_ref();
        let not_found = || HistoryError::VersionNotFound {
            path: path.to_path_buf(),
            version_id: version_id.to_string(),
        };

        let Some(series) = self.series(path)? else {
            return Err(not_found());
        };
        let Ok(timestamp) = version_id.parse::<u64>() else {
            return Err(not_found());
        };
        let backup = series.backup_path(timestamp);
        if !backup.is_file() {
            return Err(not_found());
        }

        // The snapshot may prune the requested version, so read it first.
        let content = std::fs::read(&backup).map_err(|e| HistoryError::io_error(&backup, e))?;
        self.create_backup(&series.source)?;
        std::fs::write(&series.source, content)
            .map_err(|e| HistoryError::io_error(&series.source, e))?;

        tracing::info!(file = %series.original, version = version_id, "version restored");
        Ok(series.source)
    }

    fn series(&self, path: &Path) -> Result<Option<Series>, HistoryError> {
        let source = self.files.resolve(path)?;
        let primary = self.files.primary_root();
        let Ok(rel) = source.strip_prefix(primary) else {
            tracing::warn!(path = %source.display(), "not versioned: outside primary root");
            return Ok(None);
        };
        if source.starts_with(&self.history_dir) {
            return Ok(None);
        }
        let Some(name) = rel.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return Ok(None);
        };

        let dir = match rel.parent() {
            Some(parent) => self.history_dir.join(parent),
            None => self.history_dir.clone(),
        };

        Ok(Some(Series {
            original: display_relative(&source, primary),
            source,
            dir,
            name,
        }))
    }

    /// Remove the oldest members until the series fits the cap
    fn prune(&self, series: &Series) -> Result<usize, HistoryError> {
        let mut members = Vec::new();
        for (_, backup) in series.members()? {
            let mtime = std::fs::metadata(&backup)
                .and_then(|m| m.modified())
                .map_err(|e| HistoryError::io_error(&backup, e))?;
            members.push((mtime, backup));
        }
        if members.len() <= self.max_backups {
            return Ok(0);
        }

        members.sort();
        let excess = members.len() - self.max_backups;
        for (_, backup) in members.iter().take(excess) {
            std::fs::remove_file(backup).map_err(|e| HistoryError::io_error(backup, e))?;
            tracing::debug!(backup = %backup.display(), "backup removed");
        }
        Ok(excess)
    }
}

/// Backup series of one file
#[derive(Debug)]
struct Series {
    source: PathBuf,
    original: String,
    dir: PathBuf,
    name: String,
}

impl Series {
    fn backup_path(&self, timestamp: u64) -> PathBuf {
        self.dir.join(format!("{}_{timestamp}{BACKUP_EXT}", self.name))
    }

    /// Existing members as `(timestamp, path)`; foreign files are ignored
    fn members(&self) -> Result<Vec<(u64, PathBuf)>, HistoryError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HistoryError::io_error(&self.dir, e)),
        };

        let prefix = format!("{}_", self.name);
        let mut members = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| HistoryError::io_error(&self.dir, e))?;
            let file_name = entry.file_name();
            let Some(stamp) = file_name
                .to_str()
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|n| n.strip_suffix(BACKUP_EXT))
            else {
                continue;
            };
            if stamp.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if let Ok(timestamp) = stamp.parse::<u64>() {
                members.push((timestamp, entry.path()));
            }
        }
        Ok(members)
    }

    fn entry(&self, timestamp: u64, path: PathBuf) -> BackupEntry {
        BackupEntry {
            version_id: timestamp.to_string(),
            timestamp,
            date: format_local(timestamp),
            path,
            original: self.original.clone(),
        }
    }
}

/// Copy through a temporary sibling, carry the source mtime, then rename
fn copy_preserving_mtime(source: &Path, backup: &Path, dir: &Path) -> Result<(), HistoryError> {
    let tmp_name = format!(
        ".{}.tmp",
        backup
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    let tmp = dir.join(tmp_name);

    let mtime = std::fs::metadata(source)
        .and_then(|m| m.modified())
        .map_err(|e| HistoryError::io_error(source, e))?;
    std::fs::copy(source, &tmp).map_err(|e| HistoryError::io_error(&tmp, e))?;

    let stamped = std::fs::File::options()
        .write(true)
        .open(&tmp)
        .and_then(|f| f.set_modified(mtime));
    if let Err(e) = stamped {
        let _ = std::fs::remove_file(&tmp);
        return Err(HistoryError::io_error(&tmp, e));
    }

    std::fs::rename(&tmp, backup).map_err(|e| HistoryError::io_error(backup, e))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn format_local(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|utc| {
            utc.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(max_backups: usize) -> (TempDir, Arc<FileStore>, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(FileStore::new(dir.path()).unwrap());
        let history = HistoryStore::new(Arc::clone(&files), max_backups);
        (dir, files, history)
    }

    /// Write `content` and push its mtime `step` seconds past the epoch base
    fn write_at(files: &FileStore, rel: &str, content: &str, step: u64) {
        let path = files.primary_root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        let mtime = UNIX_EPOCH + Duration::from_secs(1_600_000_000 + step);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    #[test]
    fn first_creation_has_no_backup() {
        let (_dir, _files, history) = setup(3);
        assert_eq!(history.create_backup("new.py").unwrap(), None);
        assert!(history.history("new.py").unwrap().is_empty());
    }

    #[test]
    fn backup_lands_in_mirrored_directory() {
        let (_dir, files, history) = setup(3);
        write_at(&files, "src/pkg/mod.py", "x = 1", 0);

        let entry = history.create_backup("src/pkg/mod.py").unwrap().unwrap();
        assert_eq!(entry.original, "src/pkg/mod.py");
        assert_eq!(entry.version_id, entry.timestamp.to_string());
        assert_eq!(
            entry.path.parent().unwrap(),
            files.primary_root().join(".history/src/pkg")
        );
        assert_eq!(std::fs::read_to_string(&entry.path).unwrap(), "x = 1");
        assert_eq!(entry.date.len(), "2024-01-01 00:00:00".len());
    }

    #[test]
    fn colliding_stamps_are_bumped() {
        let (_dir, files, history) = setup(5);
        write_at(&files, "a.py", "v1", 0);
        let first = history.create_backup("a.py").unwrap().unwrap();
        write_at(&files, "a.py", "v2", 1);
        let second = history.create_backup("a.py").unwrap().unwrap();

        assert_ne!(first.path, second.path);
        assert!(second.timestamp > first.timestamp);
        assert_eq!(history.history("a.py").unwrap().len(), 2);
    }

    #[test]
    fn rotation_keeps_most_recently_modified() {
        let cap = 3;
        let (_dir, files, history) = setup(cap);

        for step in 0..=cap as u64 + 1 {
            write_at(&files, "a.py", &format!("v{step}"), step);
            history.create_backup("a.py").unwrap();
        }

        let retained = history.history("a.py").unwrap();
        assert_eq!(retained.len(), cap);
        let mut contents: Vec<String> = retained
            .iter()
            .map(|e| std::fs::read_to_string(&e.path).unwrap())
            .collect();
        contents.sort();
        assert_eq!(contents, vec!["v2", "v3", "v4"]);
    }

    #[test]
    fn foreign_files_are_not_series_members() {
        let (_dir, files, history) = setup(3);
        write_at(&files, "a.py", "x", 0);
        history.create_backup("a.py").unwrap();

        let dir = files.primary_root().join(".history");
        std::fs::write(dir.join("a.py_notes.bak"), "junk").unwrap();
        std::fs::write(dir.join("a.py.bak"), "junk").unwrap();

        assert_eq!(history.history("a.py").unwrap().len(), 1);
    }

    #[test]
    fn restore_snapshots_current_first() {
        let (_dir, files, history) = setup(5);
        write_at(&files, "a.py", "x = 1", 0);
        let v1 = history.create_backup("a.py").unwrap().unwrap();
        write_at(&files, "a.py", "x = 2", 1);

        history.restore("a.py", &v1.version_id).unwrap();

        let current = std::fs::read_to_string(files.primary_root().join("a.py")).unwrap();
        assert_eq!(current, "x = 1");
        let retained = history.history("a.py").unwrap();
        assert_eq!(retained.len(), 2);
        assert!(retained
            .iter()
            .any(|e| std::fs::read_to_string(&e.path).unwrap() == "x = 2"));
    }

    #[test]
    fn restoring_oldest_at_cap_survives_pruning() {
        let (_dir, files, history) = setup(2);
        write_at(&files, "a.py", "v0", 0);
        let oldest = history.create_backup("a.py").unwrap().unwrap();
        write_at(&files, "a.py", "v1", 1);
        history.create_backup("a.py").unwrap();
        write_at(&files, "a.py", "v2", 2);

        history.restore("a.py", &oldest.version_id).unwrap();

        let current = std::fs::read_to_string(files.primary_root().join("a.py")).unwrap();
        assert_eq!(current, "v0");
        assert_eq!(history.history("a.py").unwrap().len(), 2);
    }

    #[test]
    fn restore_unknown_version_fails() {
        let (_dir, files, history) = setup(3);
        write_at(&files, "a.py", "x", 0);

        let err = history.restore("a.py", "42").unwrap_err();
        assert!(matches!(err, HistoryError::VersionNotFound { .. }));
        let err = history.restore("a.py", "../../etc").unwrap_err();
        assert!(matches!(err, HistoryError::VersionNotFound { .. }));
    }

    #[test]
    fn outside_roots_is_a_sandbox_error() {
        let (_dir, _files, history) = setup(3);
        let err = history.create_backup("../outside.py").unwrap_err();
        assert!(matches!(err, HistoryError::Sandbox(ref e) if e.is_violation()));
    }

    #[test]
    fn secondary_root_files_are_not_versioned() {
        let (_dir, files, history) = setup(3);
        let extra = tempfile::tempdir().unwrap();
        let target = extra.path().join("lib.py");
        std::fs::write(&target, "y").unwrap();
        files.add_root(extra.path());

        assert_eq!(history.create_backup(&target).unwrap(), None);
    }
}
