//! WebWire server: per-connection dispatch, session registry, graceful
//! shutdown.
//!
//! Binds [`transport::ServerTransport`] and hands each accepted connection
//! to [`agent`]'s read loop, which dispatches to user-supplied
//! [`ServerHooks`]. [`Server`] owns the shared connection table, session
//! registry, and the ops counter that drives [`Server::shutdown`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod hooks;
mod server;
pub mod transport;

pub use config::ServerConfig;
pub use context::RequestContext;
pub use error::ServerError;
pub use hooks::{NoopHooks, ServerHooks};
pub use server::Server;
pub use transport::{PendingConnection, ServerSocket, ServerTransport};
