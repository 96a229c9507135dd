#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Environment-backed configuration for the configurator service.
//!
//! Layout: `model.rs` (typed configuration and the environment reader),
//! `validate.rs` (value parsing helpers), `error.rs` (`ConfigError`).

pub mod error;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    AppConfig, ENV_BUILD_SHA, ENV_HTTP_ADDR, ENV_LOG_FORMAT, ENV_OPENROUTER_API_KEY,
    ENV_OPENROUTER_MODEL, ENV_OPENROUTER_SITE, ENV_OPENROUTER_TITLE, ENV_POCKETBASE_URL,
    SuggestionConfig,
};
