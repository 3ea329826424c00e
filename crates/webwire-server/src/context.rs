//! Per-request capability handle (§3: "created inside a request handler
//! by calling `CreateSession` on the connection").
//!
//! [`ServerHooks::on_request`] receives a [`RequestContext`] instead of a
//! bare connection id so a handler can mint a session without reaching
//! back into server internals it has no business touching.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use webwire_core::{ConnectionId, WebWireError};
use webwire_proto::SessionDescriptor;

/// Session-creation capability, erased over `Shared<E, H>` so
/// [`RequestContext`] doesn't need to carry the server's type parameters.
#[async_trait]
pub(crate) trait ConnectionOps: Send + Sync {
    async fn create_session(
        &self,
        conn_id: ConnectionId,
        key: String,
        info: serde_json::Value,
    ) -> Result<SessionDescriptor, WebWireError>;
}

/// What a request handler may do to the connection its request arrived
/// on.
pub struct RequestContext {
    pub(crate) conn_id: ConnectionId,
    pub(crate) remote_addr: SocketAddr,
    pub(crate) ops: Arc<dyn ConnectionOps>,
}

impl RequestContext {
    /// The connection this request arrived on.
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// The connection's remote address.
    #[must_use]
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Bind a new session to this connection and push a
    /// `NotifySessionCreated` announcement to the client.
    ///
    /// # Errors
    ///
    /// Returns [`WebWireError::SessionsDisabled`] if the server has
    /// sessions turned off, or [`WebWireError::MaxSessConnsReached`] if
    /// `key` is already bound to `MaxSessionConnections` connections.
    pub async fn create_session(
        &self,
        key: impl Into<String>,
        info: serde_json::Value,
    ) -> Result<SessionDescriptor, WebWireError> {
        self.ops.create_session(self.conn_id, key.into(), info).await
    }
}
