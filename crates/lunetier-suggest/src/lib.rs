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

//! AI palette suggestions for the eyewear configurator.
//!
//! Layout: `engine.rs` (the [`SuggestionEngine`] trait and the `OpenRouter`
//! client), `service.rs` (prompt assembly and reply interpretation),
//! `error.rs` (`SuggestError`).

pub mod engine;
pub mod error;
pub mod service;

pub use engine::{OpenRouterClient, OpenRouterSettings, SuggestionEngine};
pub use error::{SuggestError, SuggestResult};
pub use service::{CurrentColors, SuggestionService};
