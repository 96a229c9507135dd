//! # Design
//!
//! - One error enum spanning every phase the shell walks through.
//! - Constant messages; the failing step travels in an `operation` field.
//! - Sources stay attached so the binary reports the chain once at exit.

use thiserror::Error;

/// Result alias for the application shell.
pub type AppResult<T> = Result<T, AppError>;

/// Failure from one of the shell's startup or serving phases.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("loading configuration failed")]
    Config {
        /// Step that failed.
        operation: &'static str,
        /// Underlying configuration error.
        source: lunetier_config::ConfigError,
    },
    /// Telemetry could not be initialised.
    #[error("initialising telemetry failed")]
    Telemetry {
        /// Step that failed.
        operation: &'static str,
        /// Underlying telemetry error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The record store client could not be built.
    #[error("building the record store failed")]
    Store {
        /// Step that failed.
        operation: &'static str,
        /// Underlying store error.
        source: lunetier_store::StoreError,
    },
    /// The suggestion engine could not be built.
    #[error("building the suggestion engine failed")]
    Suggest {
        /// Step that failed.
        operation: &'static str,
        /// Underlying suggestion error.
        source: lunetier_suggest::SuggestError,
    },
    /// The HTTP listener failed to start or stopped with an error.
    #[error("running the api server failed")]
    ApiServer {
        /// Step that failed.
        operation: &'static str,
        /// Underlying server error.
        source: lunetier_api::ApiServerError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: lunetier_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) fn telemetry(
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Telemetry {
            operation,
            source: source.into(),
        }
    }

    pub(crate) const fn store(operation: &'static str, source: lunetier_store::StoreError) -> Self {
        Self::Store { operation, source }
    }

    pub(crate) const fn suggest(
        operation: &'static str,
        source: lunetier_suggest::SuggestError,
    ) -> Self {
        Self::Suggest { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: lunetier_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }
}
