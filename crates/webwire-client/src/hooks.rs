//! User-pluggable client hooks.
//!
//! A narrow capability set rather than an inheritance hierarchy: callers
//! override only the notifications they care about and get no-ops for the
//! rest (§9 "Dynamic-dispatch hooks").

use webwire_proto::{Payload, SessionDescriptor};

/// Notifications a [`crate::Client`] delivers to user code.
///
/// All methods have no-op default implementations so a caller may
/// implement only the hooks it needs.
pub trait ClientHooks: Send + Sync {
    /// The connection dropped (socket error, heartbeat miss, or a
    /// detected shutdown reply).
    fn on_disconnected(&self, _reason: &str) {}

    /// A session was bound to this client, either by `RestoreSession` or
    /// by a server-initiated `NotifySessionCreated`.
    fn on_session_created(&self, _descriptor: &SessionDescriptor) {}

    /// The session bound to this client was closed.
    fn on_session_closed(&self) {}

    /// A signal arrived from the server.
    fn on_signal(&self, _name: &[u8], _payload: &Payload) {}
}

/// The default hook set: every notification is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl ClientHooks for NoopHooks {}
