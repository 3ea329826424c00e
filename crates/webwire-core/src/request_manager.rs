//! Client-side request manager (component B).
//!
//! Correlates server replies with parked callers by 8-byte identifier.
//! Owns no socket and no transport: `webwire-client`'s connection state
//! machine calls [`RequestManager::create`] before writing a request
//! frame, then [`RequestManager::fulfill`]/[`RequestManager::fail`] when a
//! matching reply/error arrives, and [`RequestManager::fail_all`] on
//! disconnection.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::sync::{oneshot, Mutex};
use webwire_proto::{Payload, RequestId};

use crate::{env::Environment, error::WebWireError};

type Outcome = Result<Payload, WebWireError>;

/// Parks callers on pending requests and resolves them exactly once.
pub struct RequestManager<E: Environment> {
    env: E,
    next_id: AtomicU64,
    pending: Mutex<HashMap<RequestId, oneshot::Sender<Outcome>>>,
}

impl<E: Environment> RequestManager<E> {
    /// Build an empty manager. `env` provides the deadline timer.
    #[must_use]
    pub fn new(env: E) -> Self {
        Self { env, next_id: AtomicU64::new(1), pending: Mutex::new(HashMap::new()) }
    }

    /// Allocate an identifier and park a receiver for it.
    ///
    /// The identifier is a monotonic counter starting at 1; it is never
    /// reused while a request with that id is still pending (§4.B, §9).
    /// `RequestId(0)` is reserved as the sentinel for server-initiated
    /// pushes uncorrelated to any client request and is never allocated
    /// here.
    pub async fn create(&self) -> (RequestId, oneshot::Receiver<Outcome>) {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        (id, rx)
    }

    /// Await the reply to `id`, subject to `timeout` and an external
    /// cancellation future.
    ///
    /// Exactly one of reply/timeout/cancellation resolves the request;
    /// whichever fires first also removes `id` from the manager so any
    /// later resolution attempt is a silent no-op.
    pub async fn wait(
        &self,
        id: RequestId,
        receiver: oneshot::Receiver<Outcome>,
        timeout: Duration,
        cancel: impl std::future::Future<Output = ()>,
    ) -> Outcome {
        tokio::pin!(cancel);
        tokio::select! {
            result = receiver => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(WebWireError::Disconnected),
            },
            () = self.env.sleep(timeout) => {
                self.cancel(id).await;
                Err(WebWireError::DeadlineExceeded)
            },
            () = &mut cancel => {
                self.cancel(id).await;
                Err(WebWireError::Canceled)
            },
        }
    }

    /// Resolve `id` with a successful reply payload.
    ///
    /// An unknown id is a protocol-warning no-op: the server may have
    /// sent a stale reply after the client already timed out.
    pub async fn fulfill(&self, id: RequestId, payload: Payload) {
        match self.pending.lock().await.remove(&id) {
            Some(tx) => {
                let _ignored_if_receiver_dropped = tx.send(Ok(payload));
            },
            None => {
                tracing::warn!(request_id = ?id, "fulfill for unknown or already-resolved request");
            },
        }
    }

    /// Resolve `id` with an error.
    pub async fn fail(&self, id: RequestId, err: WebWireError) {
        match self.pending.lock().await.remove(&id) {
            Some(tx) => {
                let _ignored_if_receiver_dropped = tx.send(Err(err));
            },
            None => {
                tracing::warn!(request_id = ?id, "fail for unknown or already-resolved request");
            },
        }
    }

    /// Forget `id` without resolving it through the channel (the caller
    /// already observed the outcome via timeout or cancellation).
    pub async fn cancel(&self, id: RequestId) {
        self.pending.lock().await.remove(&id);
    }

    /// Resolve every pending request with `err`. Called on disconnection.
    pub async fn fail_all(&self, err: WebWireError) {
        let mut pending = self.pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ignored_if_receiver_dropped = tx.send(Err(err.clone()));
        }
    }

    /// Number of requests currently parked.
    pub async fn pending_requests(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use webwire_proto::Encoding;

    use super::*;

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            tokio::time::Instant::now().into_std()
        }

        fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            tokio::time::sleep(duration)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }

        fn unix_nanos(&self) -> u64 {
            0
        }
    }

    #[tokio::test]
    async fn fulfill_resolves_the_matching_waiter() {
        let manager = RequestManager::new(TestEnv);
        let (id, rx) = manager.create().await;

        let payload = Payload { encoding: Encoding::Binary, data: b"ok".as_slice().into() };
        manager.fulfill(id, payload.clone()).await;

        let outcome = manager.wait(id, rx, Duration::from_secs(5), std::future::pending()).await;
        assert_eq!(outcome, Ok(payload));
    }

    #[tokio::test]
    async fn fulfill_of_unknown_id_is_a_silent_no_op() {
        let manager = RequestManager::new(TestEnv);
        manager.fulfill(RequestId(999), Payload::empty()).await;
        assert_eq!(manager.pending_requests().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_resolves_as_deadline_exceeded_and_forgets_the_id() {
        let manager = RequestManager::new(TestEnv);
        let (id, rx) = manager.create().await;

        let outcome =
            manager.wait(id, rx, Duration::from_millis(10), std::future::pending()).await;
        assert_eq!(outcome, Err(WebWireError::DeadlineExceeded));
        assert_eq!(manager.pending_requests().await, 0);
    }

    #[tokio::test]
    async fn cancellation_resolves_as_canceled() {
        let manager = RequestManager::new(TestEnv);
        let (id, rx) = manager.create().await;

        let outcome =
            manager.wait(id, rx, Duration::from_secs(5), async move {}).await;
        assert_eq!(outcome, Err(WebWireError::Canceled));
        assert_eq!(manager.pending_requests().await, 0);
    }

    #[tokio::test]
    async fn fail_all_resolves_every_pending_request() {
        let manager = RequestManager::new(TestEnv);
        let (id_a, rx_a) = manager.create().await;
        let (id_b, rx_b) = manager.create().await;

        manager.fail_all(WebWireError::Disconnected).await;

        assert_eq!(
            manager.wait(id_a, rx_a, Duration::from_secs(5), std::future::pending()).await,
            Err(WebWireError::Disconnected)
        );
        assert_eq!(
            manager.wait(id_b, rx_b, Duration::from_secs(5), std::future::pending()).await,
            Err(WebWireError::Disconnected)
        );
    }

    #[tokio::test]
    async fn late_reply_after_cancellation_is_dropped() {
        let manager = RequestManager::new(TestEnv);
        let (id, rx) = manager.create().await;
        manager.cancel(id).await;

        // The caller already gave up; fulfilling afterward must not panic
        // and must not resolve the now-dropped receiver.
        manager.fulfill(id, Payload::empty()).await;
        assert!(rx.await.is_err());
    }
}
