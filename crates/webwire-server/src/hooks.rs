//! User-pluggable server hooks.
//!
//! A narrow capability set rather than an inheritance hierarchy (§9
//! "Dynamic-dispatch hooks"); every method has a default so a caller
//! implements only what it needs. `on_request` is the one hook with no
//! sensible no-op default: an unhandled request becomes an internal
//! server error, which is itself the §7-mandated behavior for handler
//! failures.

use async_trait::async_trait;
use webwire_core::{ConnectionId, WebWireError};
use webwire_proto::Payload;

use crate::context::RequestContext;

/// Notifications and handler dispatch a [`crate::Server`] delivers to
/// user code.
#[async_trait]
pub trait ServerHooks: Send + Sync {
    /// A new connection completed its transport handshake.
    async fn on_client_connected(&self, _conn: ConnectionId, _remote_addr: &str) {}

    /// A connection was removed from the server (read failure, protocol
    /// error, or shutdown).
    async fn on_client_disconnected(&self, _conn: ConnectionId) {}

    /// A signal arrived. Handler errors here are log-only (§4.F); no
    /// reply is ever sent for a signal.
    async fn on_signal(&self, _conn: ConnectionId, _name: &[u8], _payload: &Payload) {}

    /// A request arrived and expects exactly one reply.
    ///
    /// `Ok` becomes a `Reply` of matching encoding; `Err(RequestErr{..})`
    /// becomes a `ReplyError`; any other `Err` becomes
    /// `ReplyInternalError` and an error-log entry (§7 propagation
    /// policy). `ctx` is the one place a handler can mint a session on
    /// its own connection (§3).
    async fn on_request(
        &self,
        ctx: &RequestContext,
        name: &[u8],
        payload: Payload,
    ) -> Result<Payload, WebWireError>;

    /// Called before a connection's transport handshake is accepted.
    /// Returning `false` refuses the upgrade (the `BeforeUpgrade`
    /// equivalent named in the original source).
    async fn on_options(&self, _remote_addr: &str) -> bool {
        true
    }
}

/// Hook set that refuses every request with `InternalServerErr` and
/// otherwise does nothing. Useful as a placeholder before a real handler
/// set is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

#[async_trait]
impl ServerHooks for NoopHooks {
    async fn on_request(
        &self,
        _ctx: &RequestContext,
        _name: &[u8],
        _payload: Payload,
    ) -> Result<Payload, WebWireError> {
        Err(WebWireError::InternalServerErr)
    }
}
