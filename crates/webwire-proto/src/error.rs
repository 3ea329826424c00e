//! Wire-level codec errors.
//!
//! These are the decode/encode failure modes named in the message codec's
//! contract. They carry no transport or session semantics — callers above
//! this crate translate them into the broader error taxonomy.

use thiserror::Error;

/// Errors produced while encoding or decoding a [`crate::Message`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The first byte of a frame did not match any known message type.
    #[error("unknown message type tag: {0:#04x}")]
    UnknownType(u8),

    /// The frame ended before all fields required by its type were present.
    #[error("truncated frame: needed at least {needed} bytes, got {got}")]
    Truncated {
        /// Minimum byte count the variant requires.
        needed: usize,
        /// Bytes actually available.
        got: usize,
    },

    /// A UTF-16 payload had an odd number of bytes.
    #[error("utf16 payload has odd length: {0}")]
    OddUtf16Payload(usize),

    /// The declared name length extends past the end of the frame.
    #[error("name length {declared} exceeds remaining {remaining} bytes")]
    NameLengthOverflow {
        /// Length byte read from the frame.
        declared: usize,
        /// Bytes actually remaining.
        remaining: usize,
    },

    /// `ReplyError` carried a zero-length error code.
    #[error("reply error code must not be empty")]
    EmptyErrorCode,

    /// A name or error-code byte fell outside the printable ASCII range
    /// required by safe mode.
    #[error("byte {byte:#04x} at index {index} is outside the safe-mode range 32..=126")]
    UnsafeByte {
        /// Offending byte value.
        byte: u8,
        /// Index within the name/code sequence.
        index: usize,
    },

    /// The transport handed the codec a non-binary frame.
    #[error("non-binary transport frame")]
    NonBinaryFrame,
}
