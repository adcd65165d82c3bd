//! Persistent digest cache
//!
//! Maps a file's identity at a point in time, `(canonical path, size,
//! modified time)`, to its previously computed content digest so unchanged
//! files are never rehashed. Backed by sled with bincode-encoded records.
//!
//! The cache is a performance optimization, not a security boundary: a
//! missing or corrupt store degrades to an empty cache and the run
//! proceeds. Deleting the cache directory forces full recomputation and is
//! the canonical recovery path for suspected corruption.
//!
//! During the hashing phase the coordinator only reads; inserts are staged
//! into the in-memory map by the coordinating thread as worker results
//! arrive and written to durable storage by a single [`DigestCache::flush`]
//! after all files are hashed, so an interrupted run never leaves a
//! half-written store.

use crate::error::ScanError;
use crate::types::Digest;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CacheRecord {
    size: u64,
    modified: i64,
    digest: Digest,
}

/// In-memory digest map with optional sled persistence.
pub struct DigestCache {
    db: Option<sled::Db>,
    entries: RwLock<HashMap<PathBuf, CacheRecord>>,
}

impl DigestCache {
    /// Open the cache at `path`, loading any persisted entries.
    ///
    /// Never fails: an unopenable or corrupt store logs a warning and
    /// yields an empty, memory-only cache (the `CacheUnavailable` policy).
    pub fn open(path: &Path) -> Self {
        match sled::open(path) {
            Ok(db) => {
                let entries = load_entries(&db);
                debug!(path = %path.display(), entries = entries.len(), "cache loaded");
                Self {
                    db: Some(db),
                    entries: RwLock::new(entries),
                }
            }
            Err(e) => {
                warn!(
                    "{}",
                    ScanError::CacheUnavailable(format!("{}: {}", path.display(), e))
                );
                Self::in_memory()
            }
        }
    }

    /// A cache with no durable storage. Used when the store is
    /// unavailable and in tests.
    pub fn in_memory() -> Self {
        Self {
            db: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached digest iff the exact `(path, size, modified)`
    /// triple matches. Any mismatch, including absence, is a miss.
    pub fn lookup(&self, path: &Path, size: u64, modified: i64) -> Option<Digest> {
        let entries = self.entries.read();
        let record = entries.get(path)?;
        if record.size == size && record.modified == modified {
            Some(record.digest)
        } else {
            None
        }
    }

    /// Stage a freshly computed digest. An existing entry for the same
    /// path is replaced outright, so a stale `(size, modified)` pairing
    /// can never be served again.
    pub fn insert(&self, path: PathBuf, size: u64, modified: i64, digest: Digest) {
        self.entries.write().insert(
            path,
            CacheRecord {
                size,
                modified,
                digest,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Persist all staged entries. Called once per run, after hashing.
    pub fn flush(&self) -> Result<(), ScanError> {
        let Some(db) = &self.db else {
            debug!("no durable cache store; skipping flush");
            return Ok(());
        };

        let entries = self.entries.read();
        for (path, record) in entries.iter() {
            let key = path.to_string_lossy();
            let value = bincode::serialize(record).map_err(|e| {
                ScanError::CacheUnavailable(format!("failed to encode cache record: {}", e))
            })?;
            db.insert(key.as_bytes(), value).map_err(|e| {
                ScanError::CacheUnavailable(format!("failed to write cache record: {}", e))
            })?;
        }
        db.flush()
            .map_err(|e| ScanError::CacheUnavailable(format!("failed to flush cache: {}", e)))?;
        debug!(entries = entries.len(), "cache flushed");
        Ok(())
    }
}

fn load_entries(db: &sled::Db) -> HashMap<PathBuf, CacheRecord> {
    let mut entries = HashMap::new();
    for item in db.iter() {
        let (key, value) = match item {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "skipping unreadable cache entry");
                continue;
            }
        };
        let path = PathBuf::from(String::from_utf8_lossy(&key).to_string());
        match bincode::deserialize::<CacheRecord>(&value) {
            Ok(record) => {
                entries.insert(path, record);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping corrupt cache record");
            }
        }
    }
    entries
}
