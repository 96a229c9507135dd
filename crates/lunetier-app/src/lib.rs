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

//! Lunetier application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (service wiring), `error.rs` (application error type).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level errors for the boot sequence.
pub mod error;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
