//! Tracing infrastructure.
//!
//! Structured, async-aware logging built on the `tracing` and
//! `tracing-subscriber` crates: environment-based filtering (RUST_LOG wins
//! over the configured level) and multiple output formats.
//!
//! # Example
//! ```no_run
//! use multicam::logging::{self, LogFormat};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! logging::init("info", LogFormat::Pretty)?;
//! tracing::info!("application started");
//! # Ok(())
//! # }
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Output format for tracing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Pretty-printed format with colors (for development).
    #[default]
    Pretty,
    /// Compact single-line format (for production).
    Compact,
    /// JSON format for log aggregation.
    Json,
}

/// Initialize the global tracing subscriber.
///
/// `level` is the default filter directive, overridable at runtime through
/// the RUST_LOG environment variable. Fails if a global subscriber is
/// already installed.
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow!("invalid log filter '{level}': {e}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = match format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().with_ansi(false).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
