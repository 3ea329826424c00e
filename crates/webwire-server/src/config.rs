//! Server configuration.

use std::time::Duration;

/// Tunables for a [`crate::Server`], mirroring the shape of the teacher's
/// `ServerRuntimeConfig`/`DriverConfig`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Deadline applied while reading a frame from an idle connection.
    pub read_timeout: Duration,
    /// Maximum frame size this server will accept on read.
    pub message_buffer_size: usize,
    /// Whether sessions are supported at all. Mirrored into every
    /// `ConfigPush` and checked before `RequestRestoreSession`/
    /// `RequestCloseSession`.
    pub sessions_enabled: bool,
    /// Maximum number of connections a single session key may be bound
    /// to at once.
    pub max_session_connections: usize,
    /// Protocol version byte advertised in `ConfigPush`.
    pub protocol_version: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            message_buffer_size: 1 << 20,
            sessions_enabled: true,
            max_session_connections: 8,
            protocol_version: 1,
        }
    }
}
