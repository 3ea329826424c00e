//! Client-facing error type.

use thiserror::Error;
use webwire_core::WebWireError;
use webwire_proto::CodecError;

/// Errors returned by [`crate::Client`] public methods.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// A taxonomy error from the shared request/connection machinery.
    #[error(transparent)]
    WebWire(#[from] WebWireError),

    /// `Request`/`Signal` was called with both an empty name and an empty
    /// payload (§4.D: "validates that name or payload is non-empty").
    #[error("request/signal name and payload must not both be empty")]
    EmptyMessage,

    /// A public method that requires a connection was called while the
    /// client status is `Disabled` or `Disconnected` with autoconnect off.
    #[error("client is not connected")]
    NotConnected,
}

impl From<CodecError> for ClientError {
    fn from(err: CodecError) -> Self {
        Self::WebWire(err.into())
    }
}
