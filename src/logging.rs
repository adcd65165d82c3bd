//! Logging
//!
//! Structured logging via `tracing`. Diagnostics default to stderr so the
//! digest report on stdout stays machine-readable; error lines about
//! unreadable nodes are never interleaved with report lines.

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stderr, stdout
    #[serde(default = "default_output")]
    pub output: String,

    /// Colored output (text format only)
    #[serde(default = "default_true")]
    pub color: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            color: default_true(),
        }
    }
}

/// Initialize the logging system.
///
/// The `SYNTEGRITY_LOG` environment variable overrides the configured
/// level and accepts full `EnvFilter` directives.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ScanError> {
    let filter = build_env_filter(config);
    let base = Registry::default().with(filter);

    let to_stdout = match config.output.as_str() {
        "stdout" => true,
        "stderr" => false,
        other => {
            return Err(ScanError::Config(format!(
                "invalid log output: {} (must be 'stderr' or 'stdout')",
                other
            )))
        }
    };

    match config.format.as_str() {
        "json" => {
            let layer = fmt::layer()
                .json()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339());
            if to_stdout {
                base.with(layer.with_writer(std::io::stdout)).init();
            } else {
                base.with(layer.with_writer(std::io::stderr)).init();
            }
        }
        "text" => {
            let layer = fmt::layer()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(config.color);
            if to_stdout {
                base.with(layer.with_writer(std::io::stdout)).init();
            } else {
                base.with(layer.with_writer(std::io::stderr)).init();
            }
        }
        other => {
            return Err(ScanError::Config(format!(
                "invalid log format: {} (must be 'text' or 'json')",
                other
            )))
        }
    }

    Ok(())
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env("SYNTEGRITY_LOG") {
        return filter;
    }
    EnvFilter::new(config.level.as_str())
}
