//! Client-side half of the transport abstraction (component H).
//!
//! Concrete implementation over `tokio-tungstenite`, binary WebSocket
//! frames only (§4.H). TLS is out of scope: `ClientSocket::dial` connects
//! a plain `TcpStream`; a caller needing TLS terminates it before handing
//! the stream in, which this crate doesn't do since cert loading is
//! explicitly excluded.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{tungstenite::Message as WsMessage, WebSocketStream};
use webwire_core::WebWireError;
use webwire_proto::CodecError;

type WsStream = WebSocketStream<TcpStream>;
type WsSink = futures_util::stream::SplitSink<WsStream, WsMessage>;
type WsSource = futures_util::stream::SplitStream<WsStream>;

/// A dialed client-side WebSocket connection.
///
/// `write`/`read` are split into independent halves so a writer (a
/// request, signal or heartbeat) never blocks on an in-flight read and
/// vice versa; each half still serializes its own direction via its own
/// lock, matching "writers mutually exclusive via a write lock... held
/// for the entire scoped lifetime of one frame emission" (§5).
pub struct ClientSocket {
    writer: Mutex<WsSink>,
    reader: Mutex<WsSource>,
    remote_addr: std::net::SocketAddr,
}

impl ClientSocket {
    /// Dial `addr`, upgrading to a WebSocket within `dial_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`WebWireError::DeadlineExceeded`] if the TCP connect or
    /// WebSocket upgrade doesn't finish in time, or
    /// [`WebWireError::Transport`] for any I/O or handshake failure.
    pub async fn dial(addr: &str, dial_timeout: Duration) -> Result<Self, WebWireError> {
        tokio::time::timeout(dial_timeout, Self::dial_inner(addr))
            .await
            .map_err(|_elapsed| WebWireError::DeadlineExceeded)?
    }

    async fn dial_inner(addr: &str) -> Result<Self, WebWireError> {
        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|err| WebWireError::Transport(err.to_string()))?;
        let remote_addr =
            tcp.peer_addr().map_err(|err| WebWireError::Transport(err.to_string()))?;
        let url = format!("ws://{addr}/");
        let (ws, _response) = tokio_tungstenite::client_async(url, tcp)
            .await
            .map_err(|err| WebWireError::Transport(err.to_string()))?;
        let (writer, reader) = ws.split();
        Ok(Self { writer: Mutex::new(writer), reader: Mutex::new(reader), remote_addr })
    }

    /// Write one complete frame as a binary WebSocket message.
    ///
    /// The lock is held for exactly this call's lifetime: the scoped
    /// writer acquisition named in §4.H's `GetWriter`.
    pub async fn write_frame(&self, bytes: Bytes) -> Result<(), WebWireError> {
        let mut writer = self.writer.lock().await;
        writer
            .send(WsMessage::Binary(bytes.to_vec()))
            .await
            .map_err(|err| WebWireError::Transport(err.to_string()))
    }

    /// Read one frame, failing if none arrives within `deadline`.
    ///
    /// A non-binary message is rejected as [`CodecError::NonBinaryFrame`]
    /// without tearing the connection down (§4.H); the caller decides
    /// whether to treat repeated violations as fatal.
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
    pub fn remote_addr(&self) -> std::net::SocketAddr {
        self.remote_addr
    }

    /// Close the underlying WebSocket.
    pub async fn close(&self) {
        let _ = self.writer.lock().await.close().await;
    }
}
