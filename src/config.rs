//! Configuration system using Figment.
//!
//! This module provides strongly-typed configuration loading. Configuration
//! is merged from:
//! 1. A TOML file (see `config/multicam.toml` for a commented example)
//! 2. Environment variables (prefixed with MULTICAM_)
//!
//! Per-source settings stay opaque (`toml::Value`) and are interpreted by
//! whichever [`crate::source::SourceProvider`] opens the source.
//!
//! # Example
//! ```no_run
//! use multicam::config::AppConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load_from("config/multicam.toml")?;
//! println!("Application: {}", config.application.name);
//! # Ok(())
//! # }
//! ```

use crate::error::{AppResult, SessionError};
use crate::logging::LogFormat;
use crate::source::SourceDescriptor;
use crate::supervisor::SessionConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Application settings.
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Session tuning knobs.
    #[serde(default)]
    pub session: SessionConfig,
    /// Source definitions.
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

/// Application-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name, for log context.
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Logging output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// One source definition in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Bus index of the device.
    pub index: u32,
    /// Whether this source participates in the session.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Provider-specific settings (dynamic).
    #[serde(default = "default_settings")]
    pub settings: toml::Value,
}

fn default_name() -> String {
    "multicam".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_settings() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file plus environment overrides.
    ///
    /// Environment variables override file values with the MULTICAM_ prefix,
    /// e.g. `MULTICAM_APPLICATION_LOG_LEVEL=debug`.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("MULTICAM_").split("_"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(SessionError::Invalid(format!(
                "invalid log_level '{}' (expected one of: {})",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let mut indices = std::collections::HashSet::new();
        for source in &self.sources {
            if !indices.insert(source.index) {
                return Err(SessionError::Invalid(format!(
                    "duplicate source index: {}",
                    source.index
                )));
            }
        }

        Ok(())
    }

    /// Descriptors for all enabled sources, in configuration order.
    pub fn enabled_descriptors(&self) -> Vec<SourceDescriptor> {
        self.sources
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| SourceDescriptor::new(entry.index, entry.settings.clone()))
            .collect()
    }
}
