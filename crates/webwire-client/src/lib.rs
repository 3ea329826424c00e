//! WebWire client: connection state machine, request manager, heartbeat
//! and auto-reconnect.
//!
//! [`Client`] dials [`transport::ClientSocket`], reads the server's
//! initial `ConfigPush`, then spawns a read loop and a heartbeat driver
//! that stay alive until [`Client::close`] or a detected disconnection.
//! Requests are correlated by [`webwire_core::RequestManager`]; session
//! state and auto-reconnect live in the `Client` handle's `Arc`-shared
//! inner state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod hooks;
pub mod transport;

pub use client::{Client, Status};
pub use config::{AutoconnectMode, ClientConfig};
pub use error::ClientError;
pub use hooks::{ClientHooks, NoopHooks};
pub use transport::ClientSocket;
