//! Path canonicalization for stable cache keys and symlink containment

use crate::error::ScanError;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Canonicalize and normalize a path for deterministic use as a key.
///
/// Resolves symlinks, `.` and `..` via dunce (cross-platform), normalizes
/// Unicode to NFC, and strips trailing separators (except root).
pub fn canonicalize(path: &Path) -> Result<PathBuf, ScanError> {
    let canonical = dunce::canonicalize(path)
        .map_err(|e| ScanError::InvalidPath(format!("{}: {}", path.display(), e)))?;

    let normalized: String = canonical.to_string_lossy().nfc().collect();

    let mut out = normalized;
    if out.len() > 1 {
        while out.ends_with('/') || out.ends_with('\\') {
            out.pop();
        }
    }
    Ok(PathBuf::from(out))
}

/// Resolve a symlink and decide whether it may be followed.
///
/// Returns the canonical target iff it lies inside `root` (itself already
/// canonical). Dangling links and targets outside the scan root return
/// None; the walker records those as error nodes instead of following.
pub fn resolve_within(link: &Path, root: &Path) -> Option<PathBuf> {
    let target = canonicalize(link).ok()?;
    if target.starts_with(root) {
        Some(target)
    } else {
        None
    }
}
