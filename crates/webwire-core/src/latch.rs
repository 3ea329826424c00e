//! Single-shot "release once, all waiters proceed" latch (§9).
//!
//! Shared by the client's reconnection signal and the server's graceful
//! shutdown: a waiter that joins after release proceeds immediately
//! rather than blocking forever.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A latch that starts closed and, once released, stays released.
#[derive(Debug, Default)]
pub struct OnceLatch {
    notify: Notify,
    released: AtomicBool,
}

impl OnceLatch {
    /// A fresh, unreleased latch.
    #[must_use]
    pub fn new() -> Self {
        Self { notify: Notify::new(), released: AtomicBool::new(false) }
    }

    /// Release the latch, waking every current and future waiter.
    ///
    /// Idempotent: releasing an already-released latch is a no-op.
    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// True if [`OnceLatch::release`] has been called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Wait for release. Returns immediately if already released.
    ///
    /// Registers interest with the inner `Notify` before checking the
    /// flag, so a release racing with this call is never missed.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        if self.released.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn wait_returns_immediately_once_released() {
        let latch = OnceLatch::new();
        latch.release();
        tokio::time::timeout(std::time::Duration::from_millis(50), latch.wait())
            .await
            .expect("wait must not block after release");
    }

    #[tokio::test]
    async fn late_joiner_after_release_proceeds_immediately() {
        let latch = Arc::new(OnceLatch::new());
        latch.release();
        let late = Arc::clone(&latch);
        tokio::time::timeout(std::time::Duration::from_millis(50), late.wait())
            .await
            .expect("late joiner must not block");
    }

    #[tokio::test]
    async fn waiters_wake_once_released() {
        let latch = Arc::new(OnceLatch::new());
        let waiter_latch = Arc::clone(&latch);
        let waiter = tokio::spawn(async move {
            waiter_latch.wait().await;
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        latch.release();
        waiter.await.expect("waiter task panicked");
    }
}
