//! Client connection state machine (component D).
//!
//! [`Client`] is a cheap `Arc` handle: [`Client::connect`] spawns a read
//! loop and a heartbeat task, each holding its own clone, so the owner can
//! drop its handle without tearing the connection down (mirrors the
//! teacher's `ConnectedClient`/spawned-task-with-stored-handle idiom).
//! Public calls serialize against reconnection via `api_lock`: ordinary
//! calls (`Request`, `Signal`, `RestoreSession`, `CloseSession`) take a
//! shared read guard so many can run concurrently; `Connect`/`Close` take
//! an exclusive write guard since they replace the connection itself.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use webwire_core::{Environment, Heartbeat, HeartbeatAction, OnceLatch, RequestManager, WebWireError};
use webwire_proto::{Message, Payload, SessionDescriptor};

use crate::{
    config::{AutoconnectMode, ClientConfig},
    error::ClientError,
    hooks::ClientHooks,
    transport::ClientSocket,
};

/// Connection status observed by [`Client::status`] (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Autoconnect is off and no connection will be attempted.
    Disabled,
    /// Not connected; a reconnector may be running if autoconnect is on.
    Disconnected,
    /// Dialed, upgraded, and the initial `ConfigPush` has been received.
    Connected,
}

struct Shared<E: Environment> {
    env: E,
    addr: String,
    config: ClientConfig,
    hooks: Arc<dyn ClientHooks>,
    requests: RequestManager<E>,
    api_lock: RwLock<()>,
    status: Mutex<Status>,
    session: RwLock<Option<SessionDescriptor>>,
    socket: RwLock<Option<Arc<ClientSocket>>>,
    heartbeat: Mutex<Option<Heartbeat<E::Instant>>>,
    autoconnect: Mutex<AutoconnectMode>,
    reconnecting: Mutex<bool>,
    reconnect_latch: Mutex<Arc<OnceLatch>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// A WebWire client connection (component D).
///
/// Clone is cheap: every clone shares the same underlying connection and
/// request manager.
#[derive(Clone)]
pub struct Client<E: Environment> {
    shared: Arc<Shared<E>>,
}

impl<E: Environment> Client<E> {
    /// Build a client for `addr`. No connection is attempted until
    /// [`Client::connect`] is called.
    #[must_use]
    pub fn new(addr: impl Into<String>, env: E, hooks: impl ClientHooks + 'static, config: ClientConfig) -> Self {
        let autoconnect = config.autoconnect;
        let requests = RequestManager::new(env.clone());
        let initial_status = match autoconnect {
            AutoconnectMode::Disabled => Status::Disabled,
            AutoconnectMode::Deactivated | AutoconnectMode::Enabled => Status::Disconnected,
        };
        let shared = Arc::new(Shared {
            env,
            addr: addr.into(),
            config,
            hooks: Arc::new(hooks),
            requests,
            api_lock: RwLock::new(()),
            status: Mutex::new(initial_status),
            session: RwLock::new(None),
            socket: RwLock::new(None),
            heartbeat: Mutex::new(None),
            autoconnect: Mutex::new(autoconnect),
            reconnecting: Mutex::new(false),
            reconnect_latch: Mutex::new(Arc::new(OnceLatch::new())),
            tasks: Mutex::new(Vec::new()),
        });
        Self { shared }
    }

    /// Current connection status.
    pub async fn status(&self) -> Status {
        *self.shared.status.lock().await
    }

    /// The session currently bound to this connection, if any.
    pub async fn session(&self) -> Option<SessionDescriptor> {
        self.shared.session.read().await.clone()
    }

    /// One field of the bound session's `info` object, if a session is
    /// bound and the field is present.
    pub async fn session_info(&self, field: &str) -> Option<serde_json::Value> {
        self.shared.session.read().await.as_ref().and_then(|descriptor| descriptor.info.get(field).cloned())
    }

    /// Number of requests awaiting a reply.
    pub async fn pending_requests(&self) -> usize {
        self.shared.requests.pending_requests().await
    }

    /// Dial and upgrade, or resume autoconnect if it was deactivated by a
    /// prior [`Client::close`] (§4.D: "Disconnected ↔ Disabled controlled
    /// by explicit Close/Connect").
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the dial, upgrade, or initial
    /// `ConfigPush` read fails.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let _guard = self.shared.api_lock.write().await;
        {
            let mut autoconnect = self.shared.autoconnect.lock().await;
            if *autoconnect == AutoconnectMode::Deactivated {
                *autoconnect = AutoconnectMode::Enabled;
            }
        }
        if *self.shared.status.lock().await == Status::Connected {
            return Ok(());
        }
        self.dial_and_install().await
    }

    /// Tear the connection down and disable autoconnect until
    /// [`Client::connect`] is called again.
    pub async fn close(&self) {
        let _guard = self.shared.api_lock.write().await;
        *self.shared.autoconnect.lock().await = AutoconnectMode::Deactivated;
        self.teardown("explicit close").await;
        *self.shared.status.lock().await = Status::Disabled;
    }

    /// Send a correlated request and await its reply, subject to
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::EmptyMessage`] if both `name` and `payload`
    /// are empty, [`ClientError::NotConnected`] if no connection could be
    /// established within `timeout`, or a wrapped [`WebWireError`] for any
    /// protocol-level outcome (timeout, disconnection, handler error).
    pub async fn request(
        &self,
        name: impl Into<Bytes>,
        payload: Payload,
        timeout: Duration,
    ) -> Result<Payload, ClientError> {
        let _guard = self.shared.api_lock.read().await;
        let name = name.into();
        if name.is_empty() && payload.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        self.await_connected(timeout).await?;

        let (id, receiver) = self.shared.requests.create().await;
        if let Err(err) = self.write_message(&Message::Request { id, name, payload }).await {
            self.shared.requests.cancel(id).await;
            return Err(err.into());
        }
        self.shared
            .requests
            .wait(id, receiver, timeout, std::future::pending())
            .await
            .map_err(ClientError::from)
    }

    /// Send a fire-and-forget signal. No reply is ever expected.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::EmptyMessage`] if both `name` and `payload`
    /// are empty, or [`ClientError::NotConnected`] if no connection could
    /// be established within the client's default request timeout.
    pub async fn signal(&self, name: impl Into<Bytes>, payload: Payload) -> Result<(), ClientError> {
        let _guard = self.shared.api_lock.read().await;
        let name = name.into();
        if name.is_empty() && payload.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        self.await_connected(self.shared.config.default_request_timeout).await?;
        self.write_message(&Message::Signal { name, payload }).await.map_err(ClientError::from)
    }

    /// Bind an existing session, identified by `key`, to this connection.
    ///
    /// # Errors
    ///
    /// Returns a wrapped [`WebWireError::SessionNotFound`],
    /// [`WebWireError::SessionsDisabled`] or
    /// [`WebWireError::MaxSessConnsReached`] per the server's reply, or
    /// [`ClientError::NotConnected`] if no connection could be
    /// established within `timeout`.
    pub async fn restore_session(
        &self,
        key: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<SessionDescriptor, ClientError> {
        let _guard = self.shared.api_lock.read().await;
        self.await_connected(timeout).await?;

        let (id, receiver) = self.shared.requests.create().await;
        let key = key.into();
        if let Err(err) = self.write_message(&Message::RequestRestoreSession { id, key }).await {
            self.shared.requests.cancel(id).await;
            return Err(err.into());
        }
        self.shared.requests.wait(id, receiver, timeout, std::future::pending()).await?;

        self.shared
            .session
            .read()
            .await
            .clone()
            .ok_or_else(|| WebWireError::Protocol("session missing after restore".to_string()).into())
    }

    /// Close the session bound to this connection, if any.
    ///
    /// # Errors
    ///
    /// Returns a wrapped [`WebWireError::SessionsDisabled`] per the
    /// server's reply, or [`ClientError::NotConnected`] if no connection
    /// could be established within `timeout`.
    pub async fn close_session(&self, timeout: Duration) -> Result<(), ClientError> {
        let _guard = self.shared.api_lock.read().await;
        self.await_connected(timeout).await?;

        let (id, receiver) = self.shared.requests.create().await;
        if let Err(err) = self.write_message(&Message::RequestCloseSession { id }).await {
            self.shared.requests.cancel(id).await;
            return Err(err.into());
        }
        self.shared.requests.wait(id, receiver, timeout, std::future::pending()).await?;
        Ok(())
    }

    /// Block until `Connected`, dialing if currently `Disconnected` with
    /// autoconnect enabled and a reconnector already in flight.
    async fn await_connected(&self, timeout: Duration) -> Result<(), ClientError> {
        if *self.shared.status.lock().await == Status::Connected {
            return Ok(());
        }
        if *self.shared.autoconnect.lock().await != AutoconnectMode::Enabled {
            return Err(ClientError::NotConnected);
        }
        let latch = Arc::clone(&*self.shared.reconnect_latch.lock().await);
        tokio::select! {
            () = latch.wait() => {
                if *self.shared.status.lock().await == Status::Connected {
                    Ok(())
                } else {
                    Err(ClientError::NotConnected)
                }
            },
            () = self.shared.env.sleep(timeout) => Err(WebWireError::DeadlineExceeded.into()),
        }
    }

    /// Dial, read the initial `ConfigPush`, and spawn the read loop and
    /// heartbeat driver tasks.
    async fn dial_and_install(&self) -> Result<(), ClientError> {
        let socket = ClientSocket::dial(&self.shared.addr, self.shared.config.dial_timeout).await?;

        let frame = socket.read_frame(self.shared.config.dial_timeout).await?;
        match Message::decode(&frame) {
            Ok(Message::ConfigPush { .. }) => {},
            Ok(_unexpected) => {
                return Err(WebWireError::Protocol("expected ConfigPush as first frame".to_string()).into());
            },
            Err(err) => return Err(ClientError::from(err)),
        }

        let socket = Arc::new(socket);
        let now = self.shared.env.now();
        *self.shared.heartbeat.lock().await = Some(Heartbeat::new(
            now,
            self.shared.config.heartbeat_interval,
            self.shared.config.dead_peer_timeout,
        ));
        *self.shared.socket.write().await = Some(Arc::clone(&socket));
        *self.shared.status.lock().await = Status::Connected;

        let read_task = tokio::spawn(run_read_loop(self.clone(), Arc::clone(&socket)));
        let heartbeat_task = tokio::spawn(run_heartbeat(self.clone()));
        *self.shared.tasks.lock().await = vec![read_task, heartbeat_task];

        Ok(())
    }

    /// Abort driver tasks, drop the socket, fail every pending request,
    /// and notify hooks. Leaves `status`/`autoconnect` untouched for the
    /// caller to set.
    async fn teardown(&self, reason: &str) {
        for task in self.shared.tasks.lock().await.drain(..) {
            task.abort();
        }
        *self.shared.heartbeat.lock().await = None;
        if let Some(socket) = self.shared.socket.write().await.take() {
            socket.close().await;
        }
        self.shared.requests.fail_all(WebWireError::Disconnected).await;
        self.shared.hooks.on_disconnected(reason);
    }

    /// React to a detected disconnection (read failure, decode failure, or
    /// dead-peer heartbeat). Rotates the reconnect latch and spawns a
    /// reconnector if autoconnect is enabled.
    async fn handle_disconnect(&self, reason: &str) {
        self.teardown(reason).await;
        {
            let mut status = self.shared.status.lock().await;
            if *status != Status::Disabled {
                *status = Status::Disconnected;
            }
        }
        *self.shared.reconnect_latch.lock().await = Arc::new(OnceLatch::new());
        self.maybe_spawn_reconnector();
    }

    /// Spawn a reconnector task if autoconnect is enabled and one isn't
    /// already running. At most one reconnector runs per client at a time
    /// (the `reconnecting` flag).
    fn maybe_spawn_reconnector(&self) {
        let client = self.clone();
        tokio::spawn(async move {
            {
                let mut reconnecting = client.shared.reconnecting.lock().await;
                if *reconnecting {
                    return;
                }
                if *client.shared.autoconnect.lock().await != AutoconnectMode::Enabled {
                    return;
                }
                *reconnecting = true;
            }
            client.run_reconnector().await;
            *client.shared.reconnecting.lock().await = false;
        });
    }

    async fn run_reconnector(&self) {
        loop {
            if *self.shared.status.lock().await != Status::Disconnected {
                return;
            }
            if *self.shared.autoconnect.lock().await != AutoconnectMode::Enabled {
                return;
            }
            match self.dial_and_install().await {
                Ok(()) => {
                    self.shared.reconnect_latch.lock().await.release();
                    return;
                },
                Err(err) => {
                    tracing::warn!(%err, "reconnect attempt failed");
                    self.shared.env.sleep(self.shared.config.dial_timeout).await;
                },
            }
        }
    }

    /// Encode and write `message`, recording the write against the
    /// heartbeat timer (§4.C: "any outbound write postpones the next
    /// heartbeat").
    ///
    /// # Errors
    ///
    /// Returns [`WebWireError::Disconnected`] if no socket is currently
    /// installed, or a transport/protocol error from the write itself.
    async fn write_message(&self, message: &Message) -> Result<(), WebWireError> {
        let socket = { self.shared.socket.read().await.clone() };
        let Some(socket) = socket else {
            return Err(WebWireError::Disconnected);
        };
        let mut wire = Vec::new();
        message.encode(&mut wire).map_err(WebWireError::from)?;
        socket.write_frame(Bytes::from(wire)).await?;
        let now = self.shared.env.now();
        if let Some(heartbeat) = self.shared.heartbeat.lock().await.as_mut() {
            heartbeat.on_write(now);
        }
        Ok(())
    }

    /// Dispatch one decoded inbound frame.
    async fn dispatch_inbound(&self, message: Message) {
        match message {
            Message::Reply { id, payload } => self.shared.requests.fulfill(id, payload).await,
            Message::ReplyError { id, code, message } => {
                let err = WebWireError::RequestErr {
                    code: String::from_utf8_lossy(&code).into_owned(),
                    message: String::from_utf8_lossy(&message).into_owned(),
                };
                self.shared.requests.fail(id, err).await;
            },
            Message::ReplyInternalError { id } => {
                self.shared.requests.fail(id, WebWireError::InternalServerErr).await;
            },
            Message::ReplyShutdown { id } => {
                self.shared.requests.fail(id, WebWireError::ServerShutdown).await;
            },
            Message::ReplySessionNotFound { id } => {
                self.shared.requests.fail(id, WebWireError::SessionNotFound).await;
            },
            Message::ReplyMaxSessConnsReached { id } => {
                self.shared.requests.fail(id, WebWireError::MaxSessConnsReached).await;
            },
            Message::ReplySessionsDisabled { id } => {
                self.shared.requests.fail(id, WebWireError::SessionsDisabled).await;
            },
            Message::NotifySessionCreated { id, descriptor } => match SessionDescriptor::from_bytes(&descriptor) {
                Ok(parsed) => {
                    *self.shared.session.write().await = Some(parsed.clone());
                    self.shared.hooks.on_session_created(&parsed);
                    self.shared.requests.fulfill(id, Payload::binary(descriptor)).await;
                },
                Err(err) => tracing::error!(%err, "malformed session descriptor"),
            },
            Message::NotifySessionClosed { id } => {
                *self.shared.session.write().await = None;
                self.shared.hooks.on_session_closed();
                self.shared.requests.fulfill(id, Payload::empty()).await;
            },
            Message::Signal { name, payload } => self.shared.hooks.on_signal(&name, &payload),
            Message::Heartbeat | Message::ConfigPush { .. } => {},
            other => tracing::warn!(?other, "unexpected server-to-client message; ignoring"),
        }
    }
}

/// Read frames until the socket fails, dispatching each to
/// [`Client::dispatch_inbound`].
async fn run_read_loop<E: Environment>(client: Client<E>, socket: Arc<ClientSocket>) {
    loop {
        let frame = match socket.read_frame(client.shared.config.dead_peer_timeout).await {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(%err, "client read failed");
                client.handle_disconnect(&err.to_string()).await;
                return;
            },
        };

        let now = client.shared.env.now();
        if let Some(heartbeat) = client.shared.heartbeat.lock().await.as_mut() {
            heartbeat.on_read(now);
        }

        let message = match Message::decode(&frame) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(%err, "client decode failed");
                client.handle_disconnect(&err.to_string()).await;
                return;
            },
        };
        client.dispatch_inbound(message).await;
    }
}

/// Tick the heartbeat timer at a quarter of its interval, sending a
/// heartbeat or declaring the peer dead as [`Heartbeat::tick`] directs.
async fn run_heartbeat<E: Environment>(client: Client<E>) {
    let tick_interval = client.shared.config.heartbeat_interval / 4;
    loop {
        client.shared.env.sleep(tick_interval).await;
        let now = client.shared.env.now();
        let action = {
            let mut guard = client.shared.heartbeat.lock().await;
            match guard.as_mut() {
                Some(heartbeat) => heartbeat.tick(now),
                None => return,
            }
        };
        match action {
            HeartbeatAction::None => {},
            HeartbeatAction::SendHeartbeat => {
                if let Err(err) = client.write_message(&Message::Heartbeat).await {
                    tracing::debug!(%err, "heartbeat write failed");
                }
            },
            HeartbeatAction::PeerDead => {
                client.handle_disconnect("heartbeat: peer dead").await;
                return;
            },
        }
    }
}
