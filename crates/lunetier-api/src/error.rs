//! # Design
//!
//! - One error type for everything that can take down the HTTP front door.
//! - Messages stay constant; the attempted address and IO cause live in fields.
//! - Sources are kept so the shell logs the chain exactly once.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;

/// Result alias for listener setup and serving.
pub type ApiServerResult<T> = std::result::Result<T, ApiServerError>;

/// Errors raised while bringing up or running the HTTP listener.
#[derive(Debug)]
pub enum ApiServerError {
    /// The listener socket could not be claimed.
    Bind {
        /// Address the server tried to bind.
        addr: SocketAddr,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The accept loop stopped with an error.
    Serve {
        /// Underlying IO error.
        source: std::io::Error,
    },
}

impl Display for ApiServerError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { .. } => formatter.write_str("could not bind the configurator listener"),
            Self::Serve { .. } => formatter.write_str("configurator server stopped unexpectedly"),
        }
    }
}

impl Error for ApiServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Bind { source, .. } | Self::Serve { source } => Some(source),
        }
    }
}
