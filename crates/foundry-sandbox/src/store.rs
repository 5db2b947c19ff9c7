//! Sandboxed file store
//!
//! Every operation resolves its path first and refuses anything outside the
//! registered roots. The first root is the primary root: relative paths are
//! anchored there and it can never be removed.

use crate::error::{SandboxError, SandboxResult};
use crate::path::{canonicalize_existing_prefix, display_relative, is_within};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory names never descended into by [`FileStore::list_files`]
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    ".history",
    ".agent",
    "dist",
    "build",
    "venv",
    "env",
    "target",
];

/// Extensions returned by [`FileStore::list_files`]
pub const LISTED_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "html", "css", "json", "md", "txt", "yaml", "yml", "toml",
    "rs",
];

/// Default listing depth
pub const DEFAULT_LIST_DEPTH: usize = 10;

/// Multi-root sandboxed file store
#[derive(Debug)]
pub struct FileStore {
    /// Canonical primary root (also `roots[0]`)
    primary: PathBuf,
    /// Canonical approved roots, primary first
    roots: RwLock<Vec<PathBuf>>,
}

impl FileStore {
    /// Open a store rooted at `primary`, creating the directory if missing
    ///
    /// # Errors
    /// `SandboxError::Io` if the directory cannot be created or canonicalized
    pub fn new(primary: impl AsRef<Path>) -> SandboxResult<Self> {
        let primary = primary.as_ref();
        std::fs::create_dir_all(primary).map_err(|e| SandboxError::io_error(primary, e))?;
        let primary =
            std::fs::canonicalize(primary).map_err(|e| SandboxError::io_error(primary, e))?;

        tracing::info!(root = %primary.display(), "file store opened");

        Ok(Self {
            roots: RwLock::new(vec![primary.clone()]),
            primary,
        })
    }

    /// Primary root
    #[inline]
    #[must_use]
    pub fn primary_root(&self) -> &Path {
        &self.primary
    }

    /// Snapshot of the registered roots, primary first
    #[must_use]
    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots.read().clone()
    }

    /// Register an additional root
    ///
    /// Returns false if the path does not exist or is not a directory.
    /// Registering an existing root is a no-op that returns true.
    pub fn add_root(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let Ok(canonical) = std::fs::canonicalize(path) else {
            tracing::warn!(path = %path.display(), "root rejected: does not exist");
            return false;
        };
        if !canonical.is_dir() {
            tracing::warn!(path = %canonical.display(), "root rejected: not a directory");
            return false;
        }

        let mut roots = self.roots.write();
        if !roots.contains(&canonical) {
            tracing::info!(root = %canonical.display(), "root added");
            roots.push(canonical);
        }
        true
    }

    /// Unregister a root
    ///
    /// Returns false for the primary root and for paths that are not registered.
    pub fn remove_root(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        let mut roots = self.roots.write();
        match roots.iter().position(|r| *r == canonical) {
            Some(0) => {
                tracing::warn!(root = %canonical.display(), "refusing to remove primary root");
                false
            }
            Some(idx) => {
                roots.remove(idx);
                tracing::info!(root = %canonical.display(), "root removed");
                true
            }
            None => false,
        }
    }

    /// Resolve and validate a path
    ///
    /// Absolute paths are resolved as-is; relative paths against the primary
    /// root. The result must be inside at least one registered root.
    ///
    /// # Errors
    /// `SandboxError::SandboxViolation` naming the path and current roots
    pub fn resolve(&self, path: impl AsRef<Path>) -> SandboxResult<PathBuf> {
        let requested = path.as_ref();
        let candidate = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.primary.join(requested)
        };
        let resolved = canonicalize_existing_prefix(&candidate);

        let roots = self.roots.read();
        if roots.iter().any(|root| is_within(&resolved, root)) {
            Ok(resolved)
        } else {
            tracing::warn!(path = %requested.display(), "sandbox violation");
            Err(SandboxError::SandboxViolation {
                path: requested.to_path_buf(),
                roots: roots.clone(),
            })
        }
    }

    /// Is `path` inside the sandbox?
    #[must_use]
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.resolve(path).is_ok()
    }

    /// Read a file as UTF-8 text
    ///
    /// # Errors
    /// - `SandboxViolation` if outside the roots
    /// - `NotFound` if the file does not exist
    /// - `InvalidTarget` if the path is a directory
    pub async fn read(&self, path: impl AsRef<Path>) -> SandboxResult<String> {
        let resolved = self.resolve(path)?;
        let metadata = match tokio::fs::metadata(&resolved).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SandboxError::NotFound(resolved))
            }
            Err(e) => return Err(SandboxError::io_error(resolved, e)),
        };
        if metadata.is_dir() {
            return Err(SandboxError::InvalidTarget(resolved));
        }

        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| SandboxError::io_error(&resolved, e))?;
        tracing::debug!(path = %self.relative_display(&resolved), bytes = content.len(), "file read");
        Ok(content)
    }

    /// Write a file, creating parent directories as needed
    ///
    /// Returns the resolved path.
    ///
    /// # Errors
    /// `SandboxViolation` if outside the roots; `Io` on write failure
    pub async fn write(&self, path: impl AsRef<Path>, content: &str) -> SandboxResult<PathBuf> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SandboxError::io_error(parent, e))?;
        }
        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| SandboxError::io_error(&resolved, e))?;

        tracing::info!(path = %self.relative_display(&resolved), bytes = content.len(), "file written");
        Ok(resolved)
    }

    /// Does the path exist?
    ///
    /// # Errors
    /// `SandboxViolation` if outside the roots
    pub async fn exists(&self, path: impl AsRef<Path>) -> SandboxResult<bool> {
        let resolved = self.resolve(path)?;
        tokio::fs::try_exists(&resolved)
            .await
            .map_err(|e| SandboxError::io_error(resolved, e))
    }

    /// Delete a file
    ///
    /// # Errors
    /// - `SandboxViolation` if outside the roots
    /// - `NotFound` if nothing exists at the path
    /// - `InvalidTarget` if the path is a directory
    pub async fn delete(&self, path: impl AsRef<Path>) -> SandboxResult<()> {
        let resolved = self.resolve(path)?;
        let metadata = match tokio::fs::metadata(&resolved).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SandboxError::NotFound(resolved))
            }
            Err(e) => return Err(SandboxError::io_error(resolved, e)),
        };
        if metadata.is_dir() {
            return Err(SandboxError::InvalidTarget(resolved));
        }

        tokio::fs::remove_file(&resolved)
            .await
            .map_err(|e| SandboxError::io_error(&resolved, e))?;
        tracing::info!(path = %self.relative_display(&resolved), "file deleted");
        Ok(())
    }

    /// Create a directory tree
    ///
    /// # Errors
    /// `SandboxViolation` if outside the roots; `Io` on failure
    pub async fn mkdir(&self, path: impl AsRef<Path>) -> SandboxResult<PathBuf> {
        let resolved = self.resolve(path)?;
        tokio::fs::create_dir_all(&resolved)
            .await
            .map_err(|e| SandboxError::io_error(&resolved, e))?;
        tracing::debug!(path = %self.relative_display(&resolved), "directory created");
        Ok(resolved)
    }

    /// List source/text files under every root
    ///
    /// Skips [`EXCLUDED_DIRS`] and hidden directories, keeps only
    /// [`LISTED_EXTENSIONS`]. Paths are root-relative with a single root and
    /// absolute with several. Output is sorted and deduplicated.
    ///
    /// Walks the filesystem synchronously.
    #[must_use]
    pub fn list_files(&self, max_depth: usize) -> Vec<String> {
        let roots = self.roots();
        let use_absolute = roots.len() > 1;
        let mut files = BTreeSet::new();

        for root in &roots {
            let walker = WalkDir::new(root)
                .min_depth(1)
                .max_depth(max_depth.saturating_add(1))
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::debug!("skipping unreadable entry: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !has_listed_extension(entry.path()) {
                    continue;
                }
                let rendered = if use_absolute {
                    entry.path().display().to_string()
                } else {
                    display_relative(entry.path(), &self.primary)
                };
                files.insert(rendered);
            }
        }

        files.into_iter().collect()
    }

    /// Render a path relative to the primary root when inside it
    #[must_use]
    pub fn relative_display(&self, path: &Path) -> String {
        display_relative(path, &self.primary)
    }
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || EXCLUDED_DIRS.contains(&name.as_ref())
}

fn has_listed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| LISTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
