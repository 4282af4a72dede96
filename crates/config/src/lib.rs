//! Configuration management for the policy agent
//!
//! Supports loading configuration from:
//! - TOML files (config/default.toml, config/{env}.toml)
//! - Environment variables (POLICY_AGENT_ prefix)
//!
//! The insurance-terms dictionary (spacing rules, synonyms, incomplete-query
//! patterns) loads from YAML with a compiled-in default so that the search
//! pipeline works without any files on disk.

pub mod constants;
pub mod settings;
pub mod terms;

pub use settings::{
    load_settings, AnswerConfig, CacheConfig, DatabaseConfig, EmbeddingConfig, LlmConfig,
    SearchConfig, Settings,
};
pub use terms::{IncompletePattern, TermsConfig};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Initialize tracing with an env-filter (`RUST_LOG`), for binaries and
/// embedders of the library. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
