//! Server-facing error type.

use thiserror::Error;
use webwire_core::WebWireError;

/// Errors returned by [`crate::Server`] public methods.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// A taxonomy error from the shared request/connection machinery.
    #[error(transparent)]
    WebWire(#[from] WebWireError),

    /// A server-observable API call (`CloseSession`, ...) referenced a key
    /// with no active connections.
    #[error("session not found")]
    SessionNotFound,
}
