//! Client configuration.

use std::time::Duration;

/// The client's auto-reconnect policy (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoconnectMode {
    /// Never reconnect automatically.
    Disabled,
    /// Paused after an explicit [`crate::Client::close`]; resumes once
    /// [`crate::Client::connect`] is called again.
    Deactivated,
    /// Reconnect automatically on disconnection.
    Enabled,
}

/// Tunables for a [`crate::Client`], mirroring the shape of the teacher's
/// `ConnectionConfig`/`ServerRuntimeConfig`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long to wait for the initial TCP dial before giving up.
    pub dial_timeout: Duration,
    /// Interval between heartbeats when no other write has occurred.
    pub heartbeat_interval: Duration,
    /// How long without an inbound byte before the peer is declared dead.
    /// Normally `2 * heartbeat_interval`.
    pub dead_peer_timeout: Duration,
    /// Deadline applied to a `Request` call when the caller doesn't
    /// supply one.
    pub default_request_timeout: Duration,
    /// Maximum frame size this client will accept on read.
    pub message_buffer_size: usize,
    /// Auto-reconnect policy in effect when the client starts.
    pub autoconnect: AutoconnectMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(20),
            dead_peer_timeout: Duration::from_secs(40),
            default_request_timeout: Duration::from_secs(30),
            message_buffer_size: 1 << 20,
            autoconnect: AutoconnectMode::Enabled,
        }
    }
}
