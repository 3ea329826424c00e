//! Shared state machines for the WebWire client and server.
//!
//! Everything here is transport- and runtime-agnostic except for the
//! [`Environment`] abstraction's async `sleep`, which both
//! `webwire-client` and `webwire-server` drive with their own Tokio
//! reactor. Components:
//!
//! - [`request_manager`]: client-side request correlation (component B).
//! - [`heartbeat`]: client-side liveness timer (component C).
//! - [`session_registry`]: server-side session membership (component E).
//! - [`error`]: the [`WebWireError`] taxonomy shared by both sides.
//! - [`env`]: the [`Environment`] trait deterministic tests substitute.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod heartbeat;
pub mod latch;
pub mod request_manager;
pub mod session_registry;
pub mod system_env;

pub use env::Environment;
pub use error::WebWireError;
pub use heartbeat::{Heartbeat, HeartbeatAction};
pub use latch::OnceLatch;
pub use request_manager::RequestManager;
pub use session_registry::{CloseSessionOutcome, ConnectionId, SessionRegistry};
pub use system_env::SystemEnv;
