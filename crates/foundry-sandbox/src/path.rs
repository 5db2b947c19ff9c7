//! Path resolution for sandbox checks
//!
//! Resolution is two-phase: a lexical pass folds `.` and `..` so the
//! candidate never escapes through parent segments, then the longest existing
//! ancestor is canonicalized so symlinks are followed even when the target
//! itself does not exist yet.

use std::path::{Component, Path, PathBuf};

/// Fold `.` and `..` without touching the filesystem
///
/// `..` at the root stays at the root.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(segment) => out.push(segment),
        }
    }
    out
}

/// Symlink hops followed while resolving a missing tail
const MAX_LINK_HOPS: u32 = 40;

/// Canonicalize the longest existing ancestor and re-append the remainder
///
/// A dangling symlink as the first missing component is followed through its
/// target, so a write through it is validated where it would land.
/// Falls back to the lexical path when no ancestor can be canonicalized.
#[must_use]
pub fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    resolve_with_links(path, MAX_LINK_HOPS)
}

fn resolve_with_links(path: &Path, hops: u32) -> PathBuf {
    let lexical = normalize_lexically(path);
    for ancestor in lexical.ancestors() {
        let Ok(base) = std::fs::canonicalize(ancestor) else {
            continue;
        };
        let Ok(rest) = lexical.strip_prefix(ancestor) else {
            return base;
        };
        let mut tail = rest.components();
        let Some(first) = tail.next() else {
            return base;
        };

        let next = base.join(first);
        if hops > 0 && is_symlink(&next) {
            if let Ok(target) = std::fs::read_link(&next) {
                // Absolute targets replace `base` on join.
                return resolve_with_links(&base.join(target).join(tail.as_path()), hops - 1);
            }
        }
        return base.join(rest);
    }
    lexical
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Segment-wise containment: is `path` equal to or below `root`?
///
/// `/srv/app` contains `/srv/app/x` but not `/srv/app-evil`.
#[inline]
#[must_use]
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Render `path` relative to `base` with `/` separators, or absolute if outside
#[must_use]
pub fn display_relative(path: &Path, base: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.display().to_string(),
    }
}
