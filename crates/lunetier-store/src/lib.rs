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

//! Persistence layer for saved eyewear designs, backed by a `PocketBase` REST API.
//!
//! Layout: `records.rs` (the [`RecordStore`] trait and the records it exchanges),
//! `http.rs` (`HttpRecordStore`, the REST client), `error.rs` (`StoreError`).

pub mod error;
pub mod http;
pub mod records;

pub use error::{StoreError, StoreResult};
pub use http::HttpRecordStore;
pub use records::{DesignRecord, MaterialRecord, NewDesign, RecordStore};
