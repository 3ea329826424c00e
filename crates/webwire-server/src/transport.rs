//! Server-side half of the transport abstraction (component H).
//!
//! TLS/cert loading stays out of scope (§1 Non-goals name "TLS certificate
//! loading"): [`ServerTransport::from_listener`] takes a pre-bound
//! `TcpListener`, leaving TLS termination to a caller-supplied acceptor if
//! any. [`ServerTransport::bind`] is a convenience wrapper for the common
//! plaintext case.
use std::{net::SocketAddr, sync::Mutex as StdMutex, time::Duration};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpListener, net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    tungstenite::handshake::server::{Request, Response},
    tungstenite::Message as WsMessage,
    WebSocketStream,
};
use webwire_core::WebWireError;
use webwire_proto::{CodecError, Message};

type WsStream = WebSocketStream<TcpStream>;
type WsSink = futures_util::stream::SplitSink<WsStream, WsMessage>;
type WsSource = futures_util::stream::SplitStream<WsStream>;

/// Accepts WebSocket upgrades on a bound listener.
pub struct ServerTransport {
    listener: TcpListener,
}

impl ServerTransport {
    /// Wrap an already-bound listener.
    #[must_use]
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listener }
    }

    /// Bind `addr` and wrap the resulting listener.
    ///
    /// # Errors
    ///
    /// Returns [`WebWireError::Transport`] if the bind fails.
    pub async fn bind(addr: &str) -> Result<Self, WebWireError> {
        let listener =
            TcpListener::bind(addr).await.map_err(|err| WebWireError::Transport(err.to_string()))?;
        Ok(Self::from_listener(listener))
    }

    /// The address this transport is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`WebWireError::Transport`] if the OS-level lookup fails.
    pub fn local_addr(&self) -> Result<SocketAddr, WebWireError> {
        self.listener.local_addr().map_err(|err| WebWireError::Transport(err.to_string()))
    }

    /// Accept one raw TCP connection. The WebSocket handshake is a separate
    /// step ([`PendingConnection::upgrade`]) so a caller can run its
    /// `on_options` hook, which names the remote address only, in between.
    ///
    /// Callers rejecting new connections during shutdown (§4.G step 1)
    /// should stop calling `accept` rather than rely on this method to
    /// refuse; it has no notion of server lifecycle.
    ///
    /// # Errors
    ///
    /// Returns [`WebWireError::Transport`] if the accept fails.
    pub async fn accept(&self) -> Result<PendingConnection, WebWireError> {
        let (tcp, remote_addr) =
            self.listener.accept().await.map_err(|err| WebWireError::Transport(err.to_string()))?;
        Ok(PendingConnection { tcp, remote_addr })
    }
}

/// An accepted TCP connection that has not yet completed the WebSocket
/// handshake.
pub struct PendingConnection {
    tcp: TcpStream,
    remote_addr: SocketAddr,
}

impl PendingConnection {
    /// The peer's socket address, available before the handshake runs.
    #[must_use]
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Complete the WebSocket handshake, capturing the `User-Agent` header
    /// if the client sent one.
    ///
    /// # Errors
    ///
    /// Returns [`WebWireError::Transport`] if the handshake fails.
    pub async fn upgrade(self) -> Result<(ServerSocket, Option<String>), WebWireError> {
        let user_agent: StdMutex<Option<String>> = StdMutex::new(None);
        let callback = |req: &Request, resp: Response| {
            if let Some(value) = req.headers().get("user-agent") {
                if let Ok(value) = value.to_str() {
                    *user_agent.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
                        Some(value.to_owned());
                }
            }
            Ok(resp)
        };
        let ws = tokio_tungstenite::accept_hdr_async(self.tcp, callback)
            .await
            .map_err(|err| WebWireError::Transport(err.to_string()))?;
        let captured = user_agent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
        let (writer, reader) = ws.split();
        let socket = ServerSocket {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            remote_addr: self.remote_addr,
        };
        Ok((socket, captured))
    }
}

/// One accepted, upgraded connection.
///
/// Symmetric to `webwire-client`'s `ClientSocket`: split read/write halves
/// each serialize their own direction, matching the write lock held "for
/// the entire scoped lifetime of one frame emission" (§5).
pub struct ServerSocket {
    writer: Mutex<WsSink>,
    reader: Mutex<WsSource>,
    remote_addr: SocketAddr,
}

impl ServerSocket {
    /// Write one complete frame as a binary WebSocket message.
    pub async fn write_frame(&self, bytes: Bytes) -> Result<(), WebWireError> {
        let mut writer = self.writer.lock().await;
        writer
            .send(WsMessage::Binary(bytes.to_vec()))
            .await
            .map_err(|err| WebWireError::Transport(err.to_string()))
    }

    /// Read one frame. `deadline` bounds idle time, not total transfer
    /// time.
    pub async fn read_frame(&self, deadline: Duration) -> Result<Bytes, WebWireError> {
        let mut reader = self.reader.lock().await;
        let next = tokio::time::timeout(deadline, reader.next())
            .await
            .map_err(|_elapsed| WebWireError::DeadlineExceeded)?;
        match next {
            None => Err(WebWireError::Disconnected),
            Some(Err(err)) => Err(WebWireError::Transport(err.to_string())),
            Some(Ok(WsMessage::Binary(bytes))) => Ok(Bytes::from(bytes)),
            Some(Ok(WsMessage::Close(_))) => Err(WebWireError::Disconnected),
            Some(Ok(_non_binary)) => Err(CodecError::NonBinaryFrame.into()),
        }
    }

    /// The peer's socket address.
    #[must_use]
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Close the underlying WebSocket.
    pub async fn close(&self) {
        let _ = self.writer.lock().await.close().await;
    }
}

/// Encode `message` and write it as one frame.
pub(crate) async fn write_message(socket: &ServerSocket, message: &Message) -> Result<(), WebWireError> {
    let mut wire = Vec::new();
    message.encode(&mut wire).map_err(WebWireError::from)?;
    socket.write_frame(Bytes::from(wire)).await
}
