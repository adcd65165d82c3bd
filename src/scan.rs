//! Scan orchestration
//!
//! Wires the phases together for each root: walk the tree, satisfy files
//! from the cache and hash the rest across the pool, aggregate directory
//! digests post-order, and finally persist the cache once for the whole
//! run. A `Fatal` error abandons its root only; remaining roots still
//! scan.

use crate::cache::DigestCache;
use crate::content;
use crate::error::{is_fatal, ScanError};
use crate::scheduler::{self, ScanStats};
use crate::tree::walker::mtime_secs;
use crate::tree::{hasher, path, Node, Walker, WalkerConfig};
use crate::types::Digest;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, instrument};

/// Parameters the core consumes from the config/CLI layer.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Upper bound on hashing worker threads.
    pub max_workers: usize,
    /// Entry names the walker skips.
    pub ignore_names: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_workers: 8,
            ignore_names: Vec::new(),
        }
    }
}

/// The result of scanning one root directory.
pub struct ScanOutcome {
    /// Fully aggregated tree: every node carries its digests.
    pub tree: Node,
    pub stats: ScanStats,
}

/// What scanning one configured target produced.
pub enum TargetOutcome {
    /// Target was a directory; full dual-hash tree.
    Tree(ScanOutcome),
    /// Target was a single file; content digest only.
    File(Digest),
}

/// Scan one directory root to a fully aggregated tree.
#[instrument(skip(cache, options), fields(root = %root.display()))]
pub fn scan_root(
    root: &Path,
    cache: &DigestCache,
    options: &ScanOptions,
) -> Result<ScanOutcome, ScanError> {
    let start = Instant::now();

    let walker = Walker::with_config(
        root.to_path_buf(),
        WalkerConfig {
            ignore_names: options.ignore_names.clone(),
        },
    );
    let mut tree = walker.walk()?;

    let stats = scheduler::hash_tree(&mut tree, cache, options.max_workers)?;
    hasher::aggregate(&mut tree);

    info!(
        nodes = tree.node_count(),
        files_hashed = stats.files_hashed,
        cache_hits = stats.cache_hits,
        errors = stats.errors,
        duration_ms = start.elapsed().as_millis(),
        "scan complete"
    );
    Ok(ScanOutcome { tree, stats })
}

/// Hash a single-file scan target, consulting the cache like any file
/// inside a tree would.
pub fn scan_file(target: &Path, cache: &DigestCache) -> Result<Digest, ScanError> {
    let canonical = path::canonicalize(target)?;
    let meta = std::fs::metadata(&canonical)?;
    let size = meta.len();
    let modified = mtime_secs(&meta);

    if let Some(digest) = cache.lookup(&canonical, size, modified) {
        return Ok(digest);
    }

    let digest = content::hash_file(&canonical, size).map_err(|e| {
        if is_fatal(&e) {
            ScanError::Fatal {
                path: canonical.clone(),
                reason: e.to_string(),
            }
        } else {
            ScanError::Io(e)
        }
    })?;
    cache.insert(canonical, size, modified, digest);
    Ok(digest)
}

/// Scan every configured target, then flush the cache exactly once.
///
/// Per-target failures (including `Fatal`) are captured in the result
/// list; they never prevent the remaining targets from scanning or the
/// cache from persisting what was computed.
pub fn scan_all(
    targets: &[PathBuf],
    cache: &DigestCache,
    options: &ScanOptions,
) -> Vec<(PathBuf, Result<TargetOutcome, ScanError>)> {
    let mut results = Vec::with_capacity(targets.len());
    for target in targets {
        let outcome = if target.is_file() {
            scan_file(target, cache).map(TargetOutcome::File)
        } else {
            scan_root(target, cache, options).map(TargetOutcome::Tree)
        };
        if let Err(e) = &outcome {
            error!(target = %target.display(), error = %e, "target scan failed");
        }
        results.push((target.clone(), outcome));
    }

    if let Err(e) = cache.flush() {
        // Persistence failure costs performance next run, nothing else.
        error!(error = %e, "cache flush failed");
    }
    results
}
