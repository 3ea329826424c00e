//! Per-connection read loop and request/signal dispatch (component F).
//!
//! One cooperative task per connection (§5 scheduling model); every
//! handler invocation spawns its own ephemeral task in turn, so a slow
//! `on_request` never stalls this connection's read loop or any other
//! connection.

use std::sync::Arc;

use bytes::Bytes;
use webwire_core::{ConnectionId, Environment, WebWireError};
use webwire_proto::{Message, Payload, RequestId};

use crate::{
    hooks::ServerHooks,
    server::{request_context, Shared},
    transport::{write_message, ServerSocket},
};

/// Drive one connection from accept to disconnect.
pub(crate) async fn run<E, H>(
    shared: Arc<Shared<E, H>>,
    conn_id: ConnectionId,
    socket: ServerSocket,
    user_agent: Option<String>,
) where
    E: Environment,
    H: ServerHooks + 'static,
{
    let remote = socket.remote_addr().to_string();
    let socket = Arc::new(socket);

    shared.connections.write().await.insert(conn_id, Arc::clone(&socket));
    shared.hooks.on_client_connected(conn_id, &remote).await;
    tracing::info!(conn_id, %remote, user_agent = user_agent.as_deref().unwrap_or(""), "connection accepted");

    let push = Message::ConfigPush {
        protocol_version: shared.config.protocol_version,
        max_message_size: u32::try_from(shared.config.message_buffer_size).unwrap_or(u32::MAX),
        sessions_enabled: shared.config.sessions_enabled,
    };
    match write_message(&socket, &push).await {
        Ok(()) => read_loop(&shared, conn_id, &socket).await,
        Err(err) => tracing::warn!(conn_id, %err, "failed to send initial ConfigPush"),
    }

    shared.connections.write().await.remove(&conn_id);
    shared.session_registry.lock().await.deregister(conn_id);
    shared.hooks.on_client_disconnected(conn_id).await;
    tracing::info!(conn_id, "connection closed");
}

async fn read_loop<E, H>(shared: &Arc<Shared<E, H>>, conn_id: ConnectionId, socket: &Arc<ServerSocket>)
where
    E: Environment,
    H: ServerHooks + 'static,
{
    loop {
        let frame = match socket.read_frame(shared.config.read_timeout).await {
            Ok(frame) => frame,
            Err(WebWireError::Disconnected) => {
                tracing::debug!(conn_id, "peer disconnected");
                return;
            },
            Err(err) => {
                tracing::warn!(conn_id, %err, "read failed");
                return;
            },
        };

        let message = match Message::decode(&frame) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(conn_id, %err, "decode failed");
                return;
            },
        };

        dispatch(Arc::clone(shared), conn_id, Arc::clone(socket), message);
    }
}

/// Classify one decoded frame and hand it to its own task (§4.F step 3).
fn dispatch<E, H>(
    shared: Arc<Shared<E, H>>,
    conn_id: ConnectionId,
    socket: Arc<ServerSocket>,
    message: Message,
) where
    E: Environment,
    H: ServerHooks + 'static,
{
    match message {
        Message::Request { id, name, payload } => {
            tokio::spawn(handle_request(shared, conn_id, socket, id, name, payload));
        },
        Message::Signal { name, payload } => {
            tokio::spawn(handle_signal(shared, conn_id, name, payload));
        },
        Message::RequestRestoreSession { id, key } => {
            tokio::spawn(handle_restore_session(shared, conn_id, socket, id, key));
        },
        Message::RequestCloseSession { id } => {
            tokio::spawn(handle_close_session(shared, conn_id, socket, id));
        },
        Message::Heartbeat => {},
        other => {
            tracing::warn!(conn_id, ?other, "unexpected client-to-server message; ignoring");
        },
    }
}

async fn handle_request<E, H>(
    shared: Arc<Shared<E, H>>,
    conn_id: ConnectionId,
    socket: Arc<ServerSocket>,
    id: RequestId,
    name: Bytes,
    payload: Payload,
) where
    E: Environment,
    H: ServerHooks + 'static,
{
    if !shared.enter_op().await {
        let _ = write_message(&socket, &Message::ReplyShutdown { id }).await;
        return;
    }

    let ctx = request_context(conn_id, socket.remote_addr(), &shared);
    let reply = match shared.hooks.on_request(&ctx, &name, payload).await {
        Ok(payload) => Message::Reply { id, payload },
        Err(WebWireError::RequestErr { code, message }) => {
            Message::ReplyError { id, code: Bytes::from(code.into_bytes()), message: Bytes::from(message.into_bytes()) }
        },
        Err(err) => {
            tracing::error!(conn_id, %err, "request handler failed");
            Message::ReplyInternalError { id }
        },
    };

    if let Err(err) = write_message(&socket, &reply).await {
        tracing::debug!(conn_id, %err, "failed to write reply");
    }
    shared.leave_op().await;
}

async fn handle_signal<E, H>(shared: Arc<Shared<E, H>>, conn_id: ConnectionId, name: Bytes, payload: Payload)
where
    E: Environment,
    H: ServerHooks + 'static,
{
    // Late signals are dropped rather than replied to; signals never get
    // a reply in the first place (§4.F).
    if !shared.enter_op().await {
        return;
    }
    shared.hooks.on_signal(conn_id, &name, &payload).await;
    shared.leave_op().await;
}

async fn handle_restore_session<E, H>(
    shared: Arc<Shared<E, H>>,
    conn_id: ConnectionId,
    socket: Arc<ServerSocket>,
    id: RequestId,
    key: Bytes,
) where
    E: Environment,
    H: ServerHooks + 'static,
{
    if !shared.enter_op().await {
        let _ = write_message(&socket, &Message::ReplyShutdown { id }).await;
        return;
    }

    let reply = restore_session(&shared, conn_id, &key, id).await;
    if let Err(err) = write_message(&socket, &reply).await {
        tracing::debug!(conn_id, %err, "failed to write restore-session reply");
    }
    shared.leave_op().await;
}

async fn restore_session<E, H>(
    shared: &Arc<Shared<E, H>>,
    conn_id: ConnectionId,
    key: &[u8],
    id: RequestId,
) -> Message
where
    E: Environment,
    H: ServerHooks,
{
    if !shared.config.sessions_enabled {
        return Message::ReplySessionsDisabled { id };
    }

    let key = String::from_utf8_lossy(key).into_owned();
    let mut registry = shared.session_registry.lock().await;
    if !registry.is_registered(&key) {
        return Message::ReplySessionNotFound { id };
    }
    if registry.session_connections_num(&key) >= shared.config.max_session_connections {
        return Message::ReplyMaxSessConnsReached { id };
    }
    registry.register(conn_id, &key);
    drop(registry);

    let descriptor = webwire_proto::SessionDescriptor {
        key,
        creation: shared.env.unix_nanos(),
        info: serde_json::Value::Null,
    };
    match descriptor.to_bytes() {
        Ok(bytes) => Message::NotifySessionCreated { id, descriptor: Bytes::from(bytes) },
        Err(err) => {
            tracing::error!(conn_id, %err, "failed to encode session descriptor");
            Message::ReplyInternalError { id }
        },
    }
}

async fn handle_close_session<E, H>(
    shared: Arc<Shared<E, H>>,
    conn_id: ConnectionId,
    socket: Arc<ServerSocket>,
    id: RequestId,
) where
    E: Environment,
    H: ServerHooks + 'static,
{
    if !shared.enter_op().await {
        let _ = write_message(&socket, &Message::ReplyShutdown { id }).await;
        return;
    }

    let reply = if shared.config.sessions_enabled {
        shared.session_registry.lock().await.deregister(conn_id);
        Message::NotifySessionClosed { id }
    } else {
        Message::ReplySessionsDisabled { id }
    };

    if let Err(err) = write_message(&socket, &reply).await {
        tracing::debug!(conn_id, %err, "failed to write close-session reply");
    }
    shared.leave_op().await;
}

/// Used by [`crate::Server::close_session`]: push a `NotifySessionClosed`
/// to `conn_id` and tear down its transport. The registry's own
/// bookkeeping (`deregister`) is the caller's responsibility.
pub(crate) async fn notify_and_close_session<E, H>(
    shared: &Arc<Shared<E, H>>,
    conn_id: ConnectionId,
) -> Result<(), WebWireError>
where
    E: Environment,
    H: ServerHooks,
{
    let socket = { shared.connections.read().await.get(&conn_id).cloned() };
    let Some(socket) = socket else {
        return Ok(());
    };
    write_message(&socket, &Message::NotifySessionClosed { id: RequestId(0) }).await?;
    socket.close().await;
    Ok(())
}
