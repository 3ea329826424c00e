//! Production `Environment` using system time and cryptographic RNG.
//!
//! Shared by `webwire-client` and `webwire-server`, which both need a real
//! environment but neither owns the other's runtime.

use std::time::Duration;

use crate::env::Environment;

/// Production environment: `std::time::Instant` for monotonic time,
/// `tokio::time::sleep` for async delay, OS cryptographic RNG for
/// randomness.
///
/// # Panics
///
/// [`Environment::random_bytes`] panics if the OS RNG fails. A process
/// without functioning cryptographic randomness cannot safely generate
/// request/session identifiers, so continuing would be worse than
/// aborting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("OS RNG failure is unrecoverable");
    }

    #[allow(clippy::disallowed_methods, clippy::expect_used)]
    fn unix_nanos(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock is after the Unix epoch")
            .as_nanos() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::disallowed_methods)]
    fn time_advances() {
        let env = SystemEnv::new();
        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(5));
        assert!(env.now() > t1);
    }

    #[test]
    fn random_bytes_fills_the_buffer() {
        let env = SystemEnv::new();
        let mut bytes = [0u8; 32];
        env.random_bytes(&mut bytes);
        assert!(bytes.iter().any(|&b| b != 0));
    }

    #[test]
    fn unix_nanos_is_plausible() {
        let env = SystemEnv::new();
        // Some time after 2024-01-01T00:00:00Z.
        assert!(env.unix_nanos() > 1_704_067_200_000_000_000);
    }

    #[tokio::test]
    async fn sleep_waits_at_least_the_requested_duration() {
        let env = SystemEnv::new();
        let start = env.now();
        env.sleep(Duration::from_millis(20)).await;
        assert!(env.now() - start >= Duration::from_millis(20));
    }
}
