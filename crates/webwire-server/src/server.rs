//! Server lifecycle and graceful shutdown (component G).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex, RwLock};
use webwire_core::{CloseSessionOutcome, ConnectionId, Environment, OnceLatch, SessionRegistry, WebWireError};
use webwire_proto::{Message, RequestId, SessionDescriptor};

use crate::{
    agent,
    config::ServerConfig,
    context::{ConnectionOps, RequestContext},
    error::ServerError,
    hooks::ServerHooks,
    transport::{write_message, ServerSocket, ServerTransport},
};

/// Bookkeeping shared by every connection task and the owning [`Server`].
pub(crate) struct Shared<E: Environment, H: ServerHooks> {
    pub(crate) env: E,
    pub(crate) config: ServerConfig,
    pub(crate) hooks: Arc<H>,
    pub(crate) connections: RwLock<HashMap<ConnectionId, Arc<ServerSocket>>>,
    pub(crate) session_registry: Mutex<SessionRegistry>,
    pub(crate) ops: Mutex<OpsState>,
    pub(crate) shutdown_latch: OnceLatch,
    next_conn_id: AtomicU64,
}

/// The single-lock state named in §4.G's shared-state policy.
#[derive(Debug, Default)]
pub(crate) struct OpsState {
    pub(crate) shutting_down: bool,
    pub(crate) current_ops: u64,
}

impl<E: Environment, H: ServerHooks> Shared<E, H> {
    pub(crate) fn next_connection_id(&self) -> ConnectionId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Enter one in-flight handler invocation. Returns `false` without
    /// counting it if the server is already shutting down; the caller
    /// must reply `ReplyShutdown` instead of dispatching (§4.G step 3).
    pub(crate) async fn enter_op(&self) -> bool {
        let mut ops = self.ops.lock().await;
        if ops.shutting_down {
            return false;
        }
        ops.current_ops += 1;
        true
    }

    /// Leave one in-flight handler invocation, releasing the shutdown
    /// latch if this was the last one and a shutdown is pending.
    pub(crate) async fn leave_op(&self) {
        let release = {
            let mut ops = self.ops.lock().await;
            ops.current_ops = ops.current_ops.saturating_sub(1);
            ops.shutting_down && ops.current_ops == 0
        };
        if release {
            self.shutdown_latch.release();
        }
    }
}

#[async_trait]
impl<E, H> ConnectionOps for Shared<E, H>
where
    E: Environment,
    H: ServerHooks,
{
    async fn create_session(
        &self,
        conn_id: ConnectionId,
        key: String,
        info: serde_json::Value,
    ) -> Result<SessionDescriptor, WebWireError> {
        if !self.config.sessions_enabled {
            return Err(WebWireError::SessionsDisabled);
        }
        {
            let mut registry = self.session_registry.lock().await;
            if registry.session_connections_num(&key) >= self.config.max_session_connections {
                return Err(WebWireError::MaxSessConnsReached);
            }
            registry.register(conn_id, &key);
        }

        let descriptor = SessionDescriptor { key, creation: self.env.unix_nanos(), info };
        let payload = descriptor.to_bytes().map_err(|err| WebWireError::Protocol(err.to_string()))?;
        let socket = { self.connections.read().await.get(&conn_id).cloned() };
        if let Some(socket) = socket {
            let message =
                Message::NotifySessionCreated { id: RequestId(0), descriptor: Bytes::from(payload) };
            write_message(&socket, &message).await?;
        }
        Ok(descriptor)
    }
}

/// A running WebWire server: binds a transport, accepts connections, and
/// dispatches each to user-supplied [`ServerHooks`].
pub struct Server<E: Environment, H: ServerHooks> {
    shared: Arc<Shared<E, H>>,
    transport: ServerTransport,
}

impl<E, H> Server<E, H>
where
    E: Environment,
    H: ServerHooks + 'static,
{
    /// Bind `addr` and construct a server ready to [`Server::run`].
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the bind fails.
    pub async fn bind(
        addr: &str,
        env: E,
        hooks: H,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        let transport = ServerTransport::bind(addr).await?;
        Ok(Self::from_transport(transport, env, hooks, config))
    }

    /// Wrap an already-bound transport (TLS termination, if any, happens
    /// upstream of this call — see §1 Non-goals).
    #[must_use]
    pub fn from_transport(transport: ServerTransport, env: E, hooks: H, config: ServerConfig) -> Self {
        let shared = Arc::new(Shared {
            env,
            config,
            hooks: Arc::new(hooks),
            connections: RwLock::new(HashMap::new()),
            session_registry: Mutex::new(SessionRegistry::new()),
            ops: Mutex::new(OpsState::default()),
            shutdown_latch: OnceLatch::new(),
            next_conn_id: AtomicU64::new(0),
        });
        Self { shared, transport }
    }

    /// The address this server is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the OS-level lookup fails.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.transport.local_addr()?)
    }

    /// Accept connections until [`Server::shutdown`] is called.
    ///
    /// Each accepted connection runs its read loop on its own task (§5
    /// scheduling model); a slow or misbehaving handler never stalls the
    /// accept loop or any other connection.
    ///
    /// # Errors
    ///
    /// Only returns `Err` if the listener itself becomes unusable;
    /// individual accept/handshake failures are logged and skipped.
    pub async fn run(&self) -> Result<(), ServerError> {
        loop {
            if self.shared.ops.lock().await.shutting_down {
                return Ok(());
            }
            let pending = match self.transport.accept().await {
                Ok(pending) => pending,
                Err(err) => {
                    tracing::warn!(%err, "accept failed");
                    continue;
                },
            };
            let remote = pending.remote_addr().to_string();
            if !self.shared.hooks.on_options(&remote).await {
                tracing::debug!(%remote, "connection refused by on_options");
                continue;
            }
            let (socket, user_agent) = match pending.upgrade().await {
                Ok(upgraded) => upgraded,
                Err(err) => {
                    tracing::warn!(%err, %remote, "websocket handshake failed");
                    continue;
                },
            };
            let conn_id = self.shared.next_connection_id();
            let shared = Arc::clone(&self.shared);
            tokio::spawn(agent::run(shared, conn_id, socket, user_agent));
        }
    }

    /// Gracefully shut down (§4.G): the caller must also stop calling
    /// [`Server::run`]'s accept loop (it stops on its own once the flag
    /// below is observed, but a caller polling `run` in a loop should
    /// break immediately). Resolves once every in-flight request/signal
    /// handler has finished, then closes every remaining connection.
    pub async fn shutdown(&self) {
        let already_idle = {
            let mut ops = self.shared.ops.lock().await;
            ops.shutting_down = true;
            ops.current_ops == 0
        };
        if already_idle {
            self.shared.shutdown_latch.release();
        }
        self.shared.shutdown_latch.wait().await;

        let connections = self.shared.connections.read().await;
        for socket in connections.values() {
            socket.close().await;
        }
    }

    /// Number of distinct session keys with at least one bound
    /// connection.
    pub async fn active_sessions_num(&self) -> usize {
        self.shared.session_registry.lock().await.active_sessions_num()
    }

    /// Number of connections currently bound to `key`.
    pub async fn session_connections_num(&self, key: &str) -> usize {
        self.shared.session_registry.lock().await.session_connections_num(key)
    }

    /// Connection ids currently bound to `key`.
    pub async fn session_connections(&self, key: &str) -> Vec<ConnectionId> {
        self.shared.session_registry.lock().await.session_connections(key)
    }

    /// Close every connection bound to `key`: each gets a
    /// `NotifySessionClosed` push and its transport torn down; the
    /// session registry entry is removed regardless of per-connection
    /// outcome (§4.E).
    ///
    /// The connection-set enumeration is a snapshot taken under the
    /// registry lock; the per-connection work below runs without holding
    /// it.
    pub async fn close_session(&self, key: &str) -> CloseSessionOutcome {
        let snapshot = { self.shared.session_registry.lock().await.session_connections(key) };
        if snapshot.is_empty() {
            return CloseSessionOutcome::default();
        }

        let mut results = HashMap::with_capacity(snapshot.len());
        for conn_id in &snapshot {
            results.insert(*conn_id, agent::notify_and_close_session(&self.shared, *conn_id).await);
        }

        let mut registry = self.shared.session_registry.lock().await;
        registry.close_session(key, |conn_id| results.remove(&conn_id).unwrap_or(Ok(())))
    }
}

/// Build the [`RequestContext`] handed to [`ServerHooks::on_request`] for
/// one arriving request.
pub(crate) fn request_context<E, H>(
    conn_id: ConnectionId,
    remote_addr: SocketAddr,
    shared: &Arc<Shared<E, H>>,
) -> RequestContext
where
    E: Environment,
    H: ServerHooks + 'static,
{
    RequestContext { conn_id, remote_addr, ops: Arc::clone(shared) as Arc<dyn ConnectionOps> }
}
