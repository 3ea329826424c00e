//! Wire-level message codec for the WebWire protocol.
//!
//! This crate has no I/O, no runtime dependency and no notion of a
//! connection; it only knows how to turn a complete frame's bytes into a
//! [`Message`] and back. [`webwire_core`](../webwire_core/index.html) builds
//! the connection and request-manager state machines on top of it;
//! `webwire-client`/`webwire-server` drive real transports.
//!
//! # Layout
//!
//! - [`message`]: the [`Message`] tagged union and its `encode`/`decode`.
//! - [`payload`]: [`Payload`] and its [`Encoding`] tag.
//! - [`session`]: the JSON [`SessionDescriptor`] carried by session
//!   notifications.
//! - [`error`]: [`CodecError`], the only error type this crate produces.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod payload;
pub mod session;

pub use error::CodecError;
pub use message::{Message, RequestId, MAX_CODE_LEN, MAX_NAME_LEN};
pub use payload::{Encoding, Payload};
pub use session::SessionDescriptor;
