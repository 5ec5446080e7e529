//! Configuration management for Careerflow
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `CAREERFLOW__<section>__<key>`
//!
//! Examples:
//! - `CAREERFLOW__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `CAREERFLOW__WORKER__WORKERS=8`
//! - `CAREERFLOW__SPECIALISTS__ANALYZER_URL=http://analyzer:8082/invoke`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/careerflow.toml`.
//! This can be overridden using the `CAREERFLOW_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::{ByteSize, HumanDuration};
pub use models::{
    ApiLimits, Config, RetentionConfig, RetryConfig, ServerConfig, SpecialistsConfig,
    TraceConfig, WorkerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation
    /// fails (zero workers, payload cap exceeded, bad endpoint scheme, ...).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
