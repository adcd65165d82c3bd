//! Configuration
//!
//! The core consumes plain parameters (scan roots, worker cap); this layer
//! assembles them from a TOML file, `SYNTEGRITY_*` environment variables,
//! and defaults. CLI flags override on top in the binary.

use crate::logging::LoggingConfig;
use crate::scan::ScanOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Directories (or single files) to scan.
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Worker-pool size cap; the effective pool is
    /// `min(available parallelism, max_workers)`.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Digest cache location. Deleting it forces full recomputation.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Where per-root change-detection snapshots live.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Entry names the walker skips.
    #[serde(default)]
    pub ignore_names: Vec<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_max_workers() -> usize {
    num_cpus::get().min(8)
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".syntegrity/cache")
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".syntegrity/snapshots")
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            max_workers: default_max_workers(),
            cache_path: default_cache_path(),
            snapshot_dir: default_snapshot_dir(),
            ignore_names: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load configuration: explicit file (if given) or `syntegrity.toml`
    /// in the working directory, then `SYNTEGRITY_*` environment
    /// overrides (`SYNTEGRITY_MAX_WORKERS=4`, nested keys with `__`).
    pub fn load(file: Option<&Path>) -> Result<Self, crate::error::ScanError> {
        let mut builder = config::Config::builder();
        builder = match file {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(
                config::File::with_name("syntegrity")
                    .format(config::FileFormat::Toml)
                    .required(false),
            ),
        };
        builder = builder.add_source(
            config::Environment::with_prefix("SYNTEGRITY").separator("__"),
        );

        let raw = builder.build()?;
        Ok(raw.try_deserialize()?)
    }

    /// The subset the scan core consumes.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            max_workers: self.max_workers,
            ignore_names: self.ignore_names.clone(),
        }
    }
}
