//! Error types for record store operations.

use std::collections::BTreeMap;

use thiserror::Error;

/// Primary error type for record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend answered with a client or server error status.
    #[error("{operation}: backend rejected the request (status {status})")]
    Rejected {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code returned by the backend.
        status: u16,
        /// Message decoded from the backend payload.
        message: String,
        /// Field-level validation issues keyed by backend field name.
        field_errors: BTreeMap<String, String>,
    },
    /// The request could not be sent or the response never arrived.
    #[error("{operation}: transport failure")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Source transport error.
        source: reqwest::Error,
    },
    /// The backend response could not be decoded.
    #[error("{operation}: invalid backend payload")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Source decoding error.
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Whether the backend reported a validation issue for the given field.
    #[must_use]
    pub fn rejects_field(&self, field: &str) -> bool {
        matches!(self, Self::Rejected { field_errors, .. } if field_errors.contains_key(field))
    }
}

/// Convenience alias for record store results.
pub type StoreResult<T> = Result<T, StoreError>;
