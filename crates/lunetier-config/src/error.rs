//! Error types for configuration loading.

use thiserror::Error;

/// Structured errors emitted while reading environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Variable contained an invalid value.
    #[error("invalid value '{value}' for '{name}': {message}")]
    InvalidVar {
        /// Environment variable that failed validation.
        name: &'static str,
        /// Offending value.
        value: String,
        /// Human-readable error description.
        message: String,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
