//! Client heartbeat timer (component C).
//!
//! Pure action-pattern state: [`Heartbeat::tick`] takes the current time
//! and returns what the caller should do, with no I/O of its own. The
//! server side only needs to accept and discard heartbeat frames; it has
//! no use for this type.

use std::{ops::Sub, time::Duration};

/// What the caller should do after a [`Heartbeat::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Nothing due yet.
    None,
    /// No outbound write has happened within one interval; send a
    /// zero-length heartbeat frame to keep the peer from timing out.
    SendHeartbeat,
    /// No inbound byte has arrived within two intervals; the peer is
    /// considered dead. The caller should close the connection, which
    /// triggers reconnection if enabled.
    PeerDead,
}

/// Tracks read/write activity and decides when to emit or expect
/// heartbeats.
#[derive(Debug, Clone)]
pub struct Heartbeat<I> {
    interval: Duration,
    dead_peer_timeout: Duration,
    last_write: I,
    last_read: I,
}

impl<I> Heartbeat<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Start a fresh timer as of `now`.
    ///
    /// `dead_peer_timeout` is normally `2 * interval` (§4.C) but is taken
    /// explicitly so callers can tune it via configuration.
    #[must_use]
    pub fn new(now: I, interval: Duration, dead_peer_timeout: Duration) -> Self {
        Self { interval, dead_peer_timeout, last_write: now, last_read: now }
    }

    /// Record that a frame (of any kind) was written at `now`.
    ///
    /// Every outbound write resets the send side of the timer (§4.C): a
    /// request or signal frame postpones the next heartbeat exactly as a
    /// heartbeat frame itself would.
    pub fn on_write(&mut self, now: I) {
        self.last_write = now;
    }

    /// Record that a byte was read from the peer at `now`.
    pub fn on_read(&mut self, now: I) {
        self.last_read = now;
    }

    /// Advance the timer to `now` and report what's due.
    ///
    /// Dead-peer detection takes priority over sending a heartbeat: a
    /// connection that has been silent for two full intervals is
    /// considered gone, not merely due for a ping.
    pub fn tick(&mut self, now: I) -> HeartbeatAction {
        if now - self.last_read >= self.dead_peer_timeout {
            return HeartbeatAction::PeerDead;
        }
        if now - self.last_write >= self.interval {
            self.last_write = now;
            return HeartbeatAction::SendHeartbeat;
        }
        HeartbeatAction::None
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn quiet_connection_within_interval_does_nothing() {
        let t0 = Instant::now();
        let mut heartbeat = Heartbeat::new(t0, Duration::from_secs(10), Duration::from_secs(20));
        assert_eq!(heartbeat.tick(t0 + Duration::from_secs(5)), HeartbeatAction::None);
    }

    #[test]
    fn no_write_within_interval_sends_heartbeat() {
        let t0 = Instant::now();
        let mut heartbeat = Heartbeat::new(t0, Duration::from_secs(10), Duration::from_secs(20));
        assert_eq!(
            heartbeat.tick(t0 + Duration::from_secs(11)),
            HeartbeatAction::SendHeartbeat
        );
    }

    #[test]
    fn sending_a_heartbeat_resets_the_write_side() {
        let t0 = Instant::now();
        let mut heartbeat = Heartbeat::new(t0, Duration::from_secs(10), Duration::from_secs(20));
        let t1 = t0 + Duration::from_secs(11);
        assert_eq!(heartbeat.tick(t1), HeartbeatAction::SendHeartbeat);
        assert_eq!(heartbeat.tick(t1 + Duration::from_secs(5)), HeartbeatAction::None);
    }

    #[test]
    fn any_outbound_write_postpones_the_next_heartbeat() {
        let t0 = Instant::now();
        let mut heartbeat = Heartbeat::new(t0, Duration::from_secs(10), Duration::from_secs(20));
        heartbeat.on_write(t0 + Duration::from_secs(9));
        assert_eq!(heartbeat.tick(t0 + Duration::from_secs(11)), HeartbeatAction::None);
    }

    #[test]
    fn silence_for_two_intervals_declares_peer_dead() {
        let t0 = Instant::now();
        let mut heartbeat = Heartbeat::new(t0, Duration::from_secs(10), Duration::from_secs(20));
        assert_eq!(
            heartbeat.tick(t0 + Duration::from_secs(20)),
            HeartbeatAction::PeerDead
        );
    }

    #[test]
    fn inbound_read_postpones_dead_peer_detection() {
        let t0 = Instant::now();
        let mut heartbeat = Heartbeat::new(t0, Duration::from_secs(10), Duration::from_secs(20));
        heartbeat.on_read(t0 + Duration::from_secs(15));
        assert_eq!(heartbeat.tick(t0 + Duration::from_secs(20)), HeartbeatAction::SendHeartbeat);
    }
}
