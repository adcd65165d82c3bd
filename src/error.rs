//! Error types for the directory integrity engine.

use std::path::PathBuf;
use thiserror::Error;

/// Per-node failures recorded on the tree instead of aborting the scan.
///
/// A node carrying one of these contributes a fixed sentinel digest to its
/// parent's aggregation, so the rest of the tree still hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("entry vanished during scan")]
    Vanished,

    #[error("I/O failure")]
    IoFailure,
}

impl NodeError {
    /// Classify an I/O error into a per-node marker.
    ///
    /// `OutOfMemory` is deliberately not representable here; callers must
    /// promote it to [`ScanError::Fatal`] before reaching for a marker.
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => NodeError::PermissionDenied,
            std::io::ErrorKind::NotFound => NodeError::Vanished,
            _ => NodeError::IoFailure,
        }
    }
}

/// Run-level errors.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Cache file missing or corrupt. Never aborts a run; the caller
    /// proceeds with an empty cache.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Resource exhaustion. Aborts the current scan root only.
    #[error("fatal error scanning {path:?}: {reason}")]
    Fatal { path: PathBuf, reason: String },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for ScanError {
    fn from(err: config::ConfigError) -> Self {
        ScanError::Config(err.to_string())
    }
}

/// True when an I/O error means the process is out of resources and the
/// current root should be abandoned rather than marked node-by-node.
pub fn is_fatal(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::OutOfMemory
}
