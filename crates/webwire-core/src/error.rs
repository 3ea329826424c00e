//! Shared error taxonomy for the WebWire client and server.
//!
//! Distinct from [`webwire_proto::CodecError`]: codec errors are a purely
//! wire-level concern (malformed bytes), while `WebWireError` is what a
//! request caller or connection driver actually observes once those codec
//! errors, transport failures and protocol-level outcomes (shutdown, an
//! unknown session) have been classified.

use thiserror::Error;

use webwire_proto::CodecError;

/// Errors surfaced to request callers and connection drivers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebWireError {
    /// A malformed frame or invalid parameter.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The underlying transport failed to dial, read or write.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection dropped while this request was outstanding.
    #[error("disconnected")]
    Disconnected,

    /// The request's deadline elapsed before a reply arrived.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The caller cancelled the request before a reply arrived.
    #[error("canceled")]
    Canceled,

    /// A handler-produced, user-visible error reply.
    #[error("request error [{code}]: {message}")]
    RequestErr {
        /// Application-defined error code.
        code: String,
        /// Free-form error message.
        message: String,
    },

    /// The handler panicked or failed without producing a `RequestErr`.
    #[error("internal server error")]
    InternalServerErr,

    /// The server was quiescing when this request was dispatched.
    #[error("server is shutting down")]
    ServerShutdown,

    /// `RestoreSession` referenced a key the server doesn't know.
    #[error("session not found")]
    SessionNotFound,

    /// The server has sessions disabled.
    #[error("sessions are disabled")]
    SessionsDisabled,

    /// Restoring this session would exceed `MaxSessionConnections`.
    #[error("maximum session connections reached")]
    MaxSessConnsReached,
}

impl WebWireError {
    /// Returns true if retrying the same operation on a fresh connection
    /// could plausibly succeed.
    ///
    /// Protocol violations and user-defined request errors are never
    /// transient: they describe a broken peer or a rejected request, not
    /// a recoverable condition.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Disconnected | Self::DeadlineExceeded | Self::ServerShutdown
        )
    }
}

impl From<CodecError> for WebWireError {
    fn from(err: CodecError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for WebWireError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
