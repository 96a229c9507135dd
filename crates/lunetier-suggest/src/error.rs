//! Error types for palette suggestion.

use thiserror::Error;

/// Primary error type for suggestion operations.
#[derive(Debug, Error)]
pub enum SuggestError {
    /// No completion credentials were configured for this deployment.
    #[error("no completion credentials configured")]
    MissingCredentials,
    /// The completion request could not be sent or its payload decoded.
    #[error("completion request failed")]
    Upstream {
        /// Source transport error.
        source: reqwest::Error,
    },
    /// The completion endpoint answered with an error status.
    #[error("completion endpoint returned status {status}")]
    Rejected {
        /// HTTP status code returned by the endpoint.
        status: u16,
    },
    /// The completion endpoint answered without assistant content.
    #[error("empty completion reply")]
    EmptyReply,
    /// The assistant reply did not contain a readable JSON object.
    #[error("unreadable completion reply")]
    Unreadable,
    /// None of the suggested colors exist in the palette.
    #[error("suggested colors are outside the palette")]
    OutOfPalette,
}

/// Convenience alias for suggestion results.
pub type SuggestResult<T> = Result<T, SuggestError>;
