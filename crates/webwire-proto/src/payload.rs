//! Payload encoding tag and the payload byte container.

use bytes::Bytes;

/// The three payload encodings a request, reply or signal may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Opaque bytes, no alignment or charset constraints.
    Binary,
    /// UTF-8 text. No alignment constraint (single-byte code units).
    Utf8,
    /// UTF-16 text. Must have even byte length and begins on a 2-byte
    /// boundary within the frame.
    Utf16,
}

/// An encoding tag paired with its opaque byte sequence.
///
/// Payloads are read-only once handed to a handler; the underlying buffer
/// may be pooled and reused after the handler returns, so handlers that
/// need to retain data past their own invocation must copy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// How `data` should be interpreted.
    pub encoding: Encoding,
    /// Opaque payload bytes.
    pub data: Bytes,
}

impl Payload {
    /// Construct a binary payload.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self { encoding: Encoding::Binary, data: data.into() }
    }

    /// Construct a UTF-8 payload.
    #[must_use]
    pub fn utf8(data: impl Into<Bytes>) -> Self {
        Self { encoding: Encoding::Utf8, data: data.into() }
    }

    /// Construct a UTF-16 payload. Caller is responsible for the even-length
    /// invariant; `Message::encode` rejects violations.
    #[must_use]
    pub fn utf16(data: impl Into<Bytes>) -> Self {
        Self { encoding: Encoding::Utf16, data: data.into() }
    }

    /// An empty binary payload.
    #[must_use]
    pub fn empty() -> Self {
        Self::binary(Bytes::new())
    }

    /// True if this payload carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
