//! Wire message codec.
//!
//! Encodes and decodes the frames tabulated in the protocol's component A:
//! a 1-byte type tag followed by variant-specific fields, always
//! little-endian where numeric. See [`Message::encode`] and
//! [`Message::decode`].

use bytes::{Buf, BufMut, Bytes};

use crate::{
    error::CodecError,
    payload::{Encoding, Payload},
};

/// Maximum length of a request/signal name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum length of a `ReplyError` code, in bytes.
pub const MAX_CODE_LEN: usize = 255;

/// Lower bound (inclusive) of the safe-mode printable-ASCII range.
pub const SAFE_BYTE_LOW: u8 = 32;

/// Upper bound (inclusive) of the safe-mode printable-ASCII range.
pub const SAFE_BYTE_HIGH: u8 = 126;

mod tag {
    pub const SIGNAL_BINARY: u8 = 0x01;
    pub const SIGNAL_UTF8: u8 = 0x02;
    pub const SIGNAL_UTF16: u8 = 0x03;
    pub const REQUEST_BINARY: u8 = 0x04;
    pub const REQUEST_UTF8: u8 = 0x05;
    pub const REQUEST_UTF16: u8 = 0x06;
    pub const REPLY_BINARY: u8 = 0x07;
    pub const REPLY_UTF8: u8 = 0x08;
    pub const REPLY_UTF16: u8 = 0x09;
    pub const REPLY_ERROR: u8 = 0x0a;
    pub const REPLY_SHUTDOWN: u8 = 0x0b;
    pub const REPLY_INTERNAL_ERROR: u8 = 0x0c;
    pub const REPLY_SESSION_NOT_FOUND: u8 = 0x0d;
    pub const REPLY_MAX_SESS_CONNS_REACHED: u8 = 0x0e;
    pub const REPLY_SESSIONS_DISABLED: u8 = 0x0f;
    pub const REQUEST_RESTORE_SESSION: u8 = 0x10;
    pub const REQUEST_CLOSE_SESSION: u8 = 0x11;
    pub const NOTIFY_SESSION_CREATED: u8 = 0x12;
    pub const NOTIFY_SESSION_CLOSED: u8 = 0x13;
    pub const HEARTBEAT: u8 = 0x2a;
    pub const CONFIG_PUSH: u8 = 0x2b;
}

/// An 8-byte request/reply correlation identifier.
///
/// Treated as an opaque token on the wire (§6): two peers never need to
/// interpret its bits, only compare it for equality. Internally a
/// monotonic counter, little-endian encoded, per the request manager's
/// allocation policy (§4.B, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Build an identifier from its 8 little-endian wire bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    /// This identifier's 8 little-endian wire bytes.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

/// A decoded wire frame.
///
/// `Request`, `Reply` and `Signal` fold the three encoding-specific type
/// tags (`Binary`/`Utf8`/`Utf16`) into one variant each; the concrete tag
/// used on the wire is recovered from `payload.encoding`.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// The server's first frame on every fresh connection (§6).
    ConfigPush {
        /// Protocol version byte.
        protocol_version: u8,
        /// Maximum payload size the server will accept, in bytes.
        max_message_size: u32,
        /// Whether the server supports sessions.
        sessions_enabled: bool,
    },
    /// A zero-length liveness ping (§4.C). Carries no fields.
    Heartbeat,
    /// A correlated request expecting exactly one reply.
    Request {
        /// Correlation identifier chosen by the sender.
        id: RequestId,
        /// Handler name, 0-255 bytes.
        name: Bytes,
        /// Request payload.
        payload: Payload,
    },
    /// A successful reply to a `Request`.
    Reply {
        /// Identifier of the request this replies to.
        id: RequestId,
        /// Reply payload.
        payload: Payload,
    },
    /// A handler-produced, user-visible error reply.
    ReplyError {
        /// Identifier of the request this replies to.
        id: RequestId,
        /// Error code, 1-255 printable-ASCII bytes.
        code: Bytes,
        /// Free-form error message.
        message: Bytes,
    },
    /// An unclassified handler error (panic or non-`RequestErr` failure).
    ReplyInternalError {
        /// Identifier of the request this replies to.
        id: RequestId,
    },
    /// The server was quiescing when this request was dispatched.
    ReplyShutdown {
        /// Identifier of the request this replies to.
        id: RequestId,
    },
    /// `RequestRestoreSession` referenced a key the server doesn't know.
    ReplySessionNotFound {
        /// Identifier of the request this replies to.
        id: RequestId,
    },
    /// `RequestRestoreSession` would exceed `MaxSessionConnections`.
    ReplyMaxSessConnsReached {
        /// Identifier of the request this replies to.
        id: RequestId,
    },
    /// A session-related request arrived but the server has sessions off.
    ReplySessionsDisabled {
        /// Identifier of the request this replies to.
        id: RequestId,
    },
    /// A fire-and-forget message with no reply.
    Signal {
        /// Handler name, 0-255 bytes.
        name: Bytes,
        /// Signal payload.
        payload: Payload,
    },
    /// Client request to bind an existing session to this connection.
    RequestRestoreSession {
        /// Correlation identifier.
        id: RequestId,
        /// Session key to restore, UTF-8.
        key: Bytes,
    },
    /// Client request to close the session bound to this connection.
    RequestCloseSession {
        /// Correlation identifier.
        id: RequestId,
    },
    /// Server confirmation that a session now exists on this connection,
    /// carrying the JSON session descriptor (§3).
    NotifySessionCreated {
        /// Correlation identifier (the restoring request's, if any).
        id: RequestId,
        /// JSON-encoded [`crate::session::SessionDescriptor`].
        descriptor: Bytes,
    },
    /// Server confirmation that the session was closed.
    NotifySessionClosed {
        /// Correlation identifier (the closing request's, if any).
        id: RequestId,
    },
}

impl Message {
    /// Encode this message as a complete wire frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] for any of the conditions listed on
    /// [`Message::decode`]; encode and decode reject the same shapes.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), CodecError> {
        match self {
            Self::ConfigPush { protocol_version, max_message_size, sessions_enabled } => {
                dst.put_u8(tag::CONFIG_PUSH);
                dst.put_u8(*protocol_version);
                dst.put_u32_le(*max_message_size);
                dst.put_u8(u8::from(*sessions_enabled));
            },
            Self::Heartbeat => dst.put_u8(tag::HEARTBEAT),
            Self::Request { id, name, payload } => {
                encode_request_tag(dst, payload.encoding);
                dst.put_slice(&id.to_bytes());
                encode_name(dst, name)?;
                encode_payload_with_pad(dst, name.len() % 2 == 1, payload);
            },
            Self::Reply { id, payload } => {
                encode_reply_tag(dst, payload.encoding);
                dst.put_slice(&id.to_bytes());
                encode_payload_with_pad(dst, true, payload);
            },
            Self::ReplyError { id, code, message } => {
                if code.is_empty() {
                    return Err(CodecError::EmptyErrorCode);
                }
                if code.len() > MAX_CODE_LEN {
                    return Err(CodecError::NameLengthOverflow {
                        declared: code.len(),
                        remaining: MAX_CODE_LEN,
                    });
                }
                validate_safe_bytes(code)?;
                dst.put_u8(tag::REPLY_ERROR);
                dst.put_slice(&id.to_bytes());
                #[allow(clippy::cast_possible_truncation)]
                dst.put_u8(code.len() as u8);
                dst.put_slice(code);
                dst.put_slice(message);
            },
            Self::ReplyInternalError { id } => {
                dst.put_u8(tag::REPLY_INTERNAL_ERROR);
                dst.put_slice(&id.to_bytes());
            },
            Self::ReplyShutdown { id } => {
                dst.put_u8(tag::REPLY_SHUTDOWN);
                dst.put_slice(&id.to_bytes());
            },
            Self::ReplySessionNotFound { id } => {
                dst.put_u8(tag::REPLY_SESSION_NOT_FOUND);
                dst.put_slice(&id.to_bytes());
            },
            Self::ReplyMaxSessConnsReached { id } => {
                dst.put_u8(tag::REPLY_MAX_SESS_CONNS_REACHED);
                dst.put_slice(&id.to_bytes());
            },
            Self::ReplySessionsDisabled { id } => {
                dst.put_u8(tag::REPLY_SESSIONS_DISABLED);
                dst.put_slice(&id.to_bytes());
            },
            Self::Signal { name, payload } => {
                encode_signal_tag(dst, payload.encoding);
                encode_name(dst, name)?;
                encode_payload_with_pad(dst, name.len() % 2 == 1, payload);
            },
            Self::RequestRestoreSession { id, key } => {
                dst.put_u8(tag::REQUEST_RESTORE_SESSION);
                dst.put_slice(&id.to_bytes());
                dst.put_slice(key);
            },
            Self::RequestCloseSession { id } => {
                dst.put_u8(tag::REQUEST_CLOSE_SESSION);
                dst.put_slice(&id.to_bytes());
            },
            Self::NotifySessionCreated { id, descriptor } => {
                dst.put_u8(tag::NOTIFY_SESSION_CREATED);
                dst.put_slice(&id.to_bytes());
                dst.put_slice(descriptor);
            },
            Self::NotifySessionClosed { id } => {
                dst.put_u8(tag::NOTIFY_SESSION_CLOSED);
                dst.put_slice(&id.to_bytes());
            },
        }
        Ok(())
    }

    /// Decode a complete wire frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if: the type tag is unknown; the frame is
    /// truncated for its variant; a UTF-16 payload has odd length; a
    /// declared name/code length exceeds the remaining bytes; a
    /// `ReplyError` code is empty; a name/code byte falls outside
    /// 32..=126.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut buf = bytes;
        let tag = read_u8(&mut buf)?;
        match tag {
            tag::CONFIG_PUSH => {
                require(buf.len(), 6)?;
                let protocol_version = read_u8(&mut buf)?;
                let max_message_size = buf.get_u32_le();
                let sessions_enabled = read_u8(&mut buf)? != 0;
                Ok(Self::ConfigPush { protocol_version, max_message_size, sessions_enabled })
            },
            tag::HEARTBEAT => Ok(Self::Heartbeat),
            tag::REQUEST_BINARY | tag::REQUEST_UTF8 | tag::REQUEST_UTF16 => {
                let encoding = encoding_for_request_tag(tag);
                let id = read_id(&mut buf)?;
                let name = read_name(&mut buf)?;
                let payload = read_payload_with_pad(&mut buf, name.len() % 2 == 1, encoding)?;
                Ok(Self::Request { id, name, payload })
            },
            tag::REPLY_BINARY | tag::REPLY_UTF8 | tag::REPLY_UTF16 => {
                let encoding = encoding_for_reply_tag(tag);
                let id = read_id(&mut buf)?;
                let payload = read_payload_with_pad(&mut buf, true, encoding)?;
                Ok(Self::Reply { id, payload })
            },
            tag::REPLY_ERROR => {
                let id = read_id(&mut buf)?;
                let code_len = usize::from(read_u8(&mut buf)?);
                if code_len == 0 {
                    return Err(CodecError::EmptyErrorCode);
                }
                require(buf.len(), code_len)?;
                let code = Bytes::copy_from_slice(&buf[..code_len]);
                validate_safe_bytes(&code)?;
                buf.advance(code_len);
                let message = Bytes::copy_from_slice(buf);
                Ok(Self::ReplyError { id, code, message })
            },
            tag::REPLY_INTERNAL_ERROR => Ok(Self::ReplyInternalError { id: read_id(&mut buf)? }),
            tag::REPLY_SHUTDOWN => Ok(Self::ReplyShutdown { id: read_id(&mut buf)? }),
            tag::REPLY_SESSION_NOT_FOUND => {
                Ok(Self::ReplySessionNotFound { id: read_id(&mut buf)? })
            },
            tag::REPLY_MAX_SESS_CONNS_REACHED => {
                Ok(Self::ReplyMaxSessConnsReached { id: read_id(&mut buf)? })
            },
            tag::REPLY_SESSIONS_DISABLED => {
                Ok(Self::ReplySessionsDisabled { id: read_id(&mut buf)? })
            },
            tag::SIGNAL_BINARY | tag::SIGNAL_UTF8 | tag::SIGNAL_UTF16 => {
                let encoding = encoding_for_signal_tag(tag);
                let name = read_name(&mut buf)?;
                let payload = read_payload_with_pad(&mut buf, name.len() % 2 == 1, encoding)?;
                Ok(Self::Signal { name, payload })
            },
            tag::REQUEST_RESTORE_SESSION => {
                let id = read_id(&mut buf)?;
                Ok(Self::RequestRestoreSession { id, key: Bytes::copy_from_slice(buf) })
            },
            tag::REQUEST_CLOSE_SESSION => {
                Ok(Self::RequestCloseSession { id: read_id(&mut buf)? })
            },
            tag::NOTIFY_SESSION_CREATED => {
                let id = read_id(&mut buf)?;
                Ok(Self::NotifySessionCreated { id, descriptor: Bytes::copy_from_slice(buf) })
            },
            tag::NOTIFY_SESSION_CLOSED => {
                Ok(Self::NotifySessionClosed { id: read_id(&mut buf)? })
            },
            other => Err(CodecError::UnknownType(other)),
        }
    }
}

fn encode_request_tag(dst: &mut impl BufMut, encoding: Encoding) {
    dst.put_u8(match encoding {
        Encoding::Binary => tag::REQUEST_BINARY,
        Encoding::Utf8 => tag::REQUEST_UTF8,
        Encoding::Utf16 => tag::REQUEST_UTF16,
    });
}

fn encode_reply_tag(dst: &mut impl BufMut, encoding: Encoding) {
    dst.put_u8(match encoding {
        Encoding::Binary => tag::REPLY_BINARY,
        Encoding::Utf8 => tag::REPLY_UTF8,
        Encoding::Utf16 => tag::REPLY_UTF16,
    });
}

fn encode_signal_tag(dst: &mut impl BufMut, encoding: Encoding) {
    dst.put_u8(match encoding {
        Encoding::Binary => tag::SIGNAL_BINARY,
        Encoding::Utf8 => tag::SIGNAL_UTF8,
        Encoding::Utf16 => tag::SIGNAL_UTF16,
    });
}

fn encoding_for_request_tag(tag: u8) -> Encoding {
    match tag {
        tag::REQUEST_UTF8 => Encoding::Utf8,
        tag::REQUEST_UTF16 => Encoding::Utf16,
        _ => Encoding::Binary,
    }
}

fn encoding_for_reply_tag(tag: u8) -> Encoding {
    match tag {
        tag::REPLY_UTF8 => Encoding::Utf8,
        tag::REPLY_UTF16 => Encoding::Utf16,
        _ => Encoding::Binary,
    }
}

fn encoding_for_signal_tag(tag: u8) -> Encoding {
    match tag {
        tag::SIGNAL_UTF8 => Encoding::Utf8,
        tag::SIGNAL_UTF16 => Encoding::Utf16,
        _ => Encoding::Binary,
    }
}

/// Encode a name field: 1-byte length + bytes. Rejects names over 255
/// bytes or (in safe mode, always enforced here) containing unsafe bytes.
fn encode_name(dst: &mut impl BufMut, name: &[u8]) -> Result<(), CodecError> {
    if name.len() > MAX_NAME_LEN {
        return Err(CodecError::NameLengthOverflow { declared: name.len(), remaining: MAX_NAME_LEN });
    }
    validate_safe_bytes(name)?;
    #[allow(clippy::cast_possible_truncation)]
    dst.put_u8(name.len() as u8);
    dst.put_slice(name);
    Ok(())
}

/// Write a payload, inserting the single Utf16 alignment pad byte when
/// `pad` is set. `Reply` pads unconditionally (no name field precedes its
/// payload); `Request`/`Signal` pad when their name field's length is odd,
/// matching the original source's `writeMsgSignal.go`.
fn encode_payload_with_pad(dst: &mut impl BufMut, pad: bool, payload: &Payload) {
    if payload.encoding == Encoding::Utf16 && pad {
        dst.put_u8(0);
    }
    dst.put_slice(&payload.data);
}

fn read_payload_with_pad(
    buf: &mut &[u8],
    pad: bool,
    encoding: Encoding,
) -> Result<Payload, CodecError> {
    if encoding == Encoding::Utf16 && pad {
        require(buf.len(), 1)?;
        buf.advance(1);
    }
    if encoding == Encoding::Utf16 && buf.len() % 2 != 0 {
        return Err(CodecError::OddUtf16Payload(buf.len()));
    }
    let data = Bytes::copy_from_slice(buf);
    buf.advance(buf.len());
    Ok(Payload { encoding, data })
}

fn validate_safe_bytes(bytes: &[u8]) -> Result<(), CodecError> {
    for (index, &byte) in bytes.iter().enumerate() {
        if !(SAFE_BYTE_LOW..=SAFE_BYTE_HIGH).contains(&byte) {
            return Err(CodecError::UnsafeByte { byte, index });
        }
    }
    Ok(())
}

fn require(available: usize, needed: usize) -> Result<(), CodecError> {
    if available < needed {
        return Err(CodecError::Truncated { needed, got: available });
    }
    Ok(())
}

fn read_u8(buf: &mut &[u8]) -> Result<u8, CodecError> {
    require(buf.len(), 1)?;
    let byte = buf[0];
    buf.advance(1);
    Ok(byte)
}

fn read_id(buf: &mut &[u8]) -> Result<RequestId, CodecError> {
    require(buf.len(), 8)?;
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[..8]);
    buf.advance(8);
    Ok(RequestId::from_bytes(bytes))
}

fn read_name(buf: &mut &[u8]) -> Result<Bytes, CodecError> {
    let len = usize::from(read_u8(buf)?);
    if len > buf.len() {
        return Err(CodecError::NameLengthOverflow { declared: len, remaining: buf.len() });
    }
    let name = Bytes::copy_from_slice(&buf[..len]);
    validate_safe_bytes(&name)?;
    buf.advance(len);
    Ok(name)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn roundtrip(message: &Message) -> Message {
        let mut wire = Vec::new();
        message.encode(&mut wire).expect("encode");
        Message::decode(&wire).expect("decode")
    }

    #[test]
    fn config_push_round_trips() {
        let message = Message::ConfigPush {
            protocol_version: 1,
            max_message_size: 1 << 20,
            sessions_enabled: true,
        };
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn heartbeat_round_trips() {
        assert_eq!(roundtrip(&Message::Heartbeat), Message::Heartbeat);
    }

    #[test]
    fn echo_request_scenario() {
        let message = Message::Request {
            id: RequestId(0x0101_0101_0101_0101),
            name: Bytes::new(),
            payload: Payload::binary(vec![0xDE, 0xAD, 0xBE, 0xEF]),
        };
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn utf16_signal_scenario() {
        let payload_bytes: Vec<u8> =
            vec![0x00, 0x73, 0x00, 0x61, 0x00, 0x6D, 0x00, 0x70, 0x00, 0x6C, 0x00, 0x65];
        let message =
            Message::Signal { name: Bytes::new(), payload: Payload::utf16(payload_bytes) };
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn utf16_request_inserts_alignment_pad_for_odd_name() {
        // name length 1 is odd -> pad inserted, per the original source's
        // name-length parity (not the byte offset from the frame start).
        let message = Message::Request {
            id: RequestId(1),
            name: Bytes::from_static(b"a"),
            payload: Payload::utf16(vec![0x00, 0x41]),
        };
        let mut wire = Vec::new();
        message.encode(&mut wire).unwrap();
        // tag(1) + id(8) + namelen(1) + name(1) + pad(1) + payload(2)
        assert_eq!(wire.len(), 1 + 8 + 1 + 1 + 1 + 2);
        assert_eq!(roundtrip(&message), message);

        // name length 0 is even -> no pad.
        let message = Message::Request {
            id: RequestId(1),
            name: Bytes::new(),
            payload: Payload::utf16(vec![0x00, 0x41]),
        };
        let mut wire = Vec::new();
        message.encode(&mut wire).unwrap();
        assert_eq!(wire.len(), 1 + 8 + 1 + 0 + 2);
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn utf16_reply_pads_unconditionally() {
        // Reply has no name field; its Utf16 pad is unconditional (§4.A),
        // unlike Request/Signal which key off the name's length parity.
        let message = Message::Reply { id: RequestId(1), payload: Payload::utf16(vec![0x00, 0x41]) };
        let mut wire = Vec::new();
        message.encode(&mut wire).unwrap();
        assert_eq!(wire.len(), 1 + 8 + 1 + 2); // tag + id + pad + payload
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn odd_utf16_payload_rejected_on_decode() {
        let mut wire = vec![tag::REQUEST_UTF16];
        wire.extend_from_slice(&RequestId(1).to_bytes());
        wire.push(1); // name len 1, odd -> pad expected
        wire.push(b'a');
        wire.push(0); // pad
        wire.push(0xAB); // one stray payload byte, odd length
        let result = Message::decode(&wire);
        assert!(matches!(result, Err(CodecError::OddUtf16Payload(_))));
    }

    #[test]
    fn name_length_255_accepted_256_rejected() {
        let name_255 = Bytes::from(vec![b'a'; 255]);
        let message =
            Message::Signal { name: name_255, payload: Payload::binary(Bytes::new()) };
        assert_eq!(roundtrip(&message), message);

        let mut wire = vec![tag::SIGNAL_BINARY, 255];
        wire.extend(std::iter::repeat_n(b'a', 256));
        // name length byte can only encode up to 255, so construct manually to
        // simulate a corrupt declared length of 255 with fewer bytes available.
        let result = Message::decode(&wire[..2]);
        assert!(matches!(result, Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn reply_error_rejects_zero_length_code() {
        let message = Message::ReplyError { id: RequestId(1), code: Bytes::new(), message: Bytes::new() };
        let mut wire = Vec::new();
        assert!(matches!(message.encode(&mut wire), Err(CodecError::EmptyErrorCode)));
    }

    #[test]
    fn unsafe_name_byte_rejected() {
        let message = Message::Signal {
            name: Bytes::from_static(&[0x01]),
            payload: Payload::binary(Bytes::new()),
        };
        let mut wire = Vec::new();
        assert!(matches!(message.encode(&mut wire), Err(CodecError::UnsafeByte { .. })));
    }

    #[test]
    fn unknown_type_tag_rejected() {
        let result = Message::decode(&[0xFF]);
        assert!(matches!(result, Err(CodecError::UnknownType(0xFF))));
    }

    #[test]
    fn truncated_frame_rejected() {
        let result = Message::decode(&[tag::REQUEST_BINARY, 1, 2, 3]);
        assert!(matches!(result, Err(CodecError::Truncated { .. })));
    }

    fn arb_payload() -> impl Strategy<Value = Payload> {
        prop_oneof![
            any::<Vec<u8>>().prop_map(Payload::binary),
            any::<Vec<u8>>().prop_map(Payload::utf8),
            any::<Vec<u8>>().prop_map(|mut bytes| {
                if bytes.len() % 2 != 0 {
                    bytes.push(0);
                }
                Payload::utf16(bytes)
            }),
        ]
    }

    fn arb_name() -> impl Strategy<Value = Bytes> {
        proptest::collection::vec(SAFE_BYTE_LOW..=SAFE_BYTE_HIGH, 0..=MAX_NAME_LEN)
            .prop_map(Bytes::from)
    }

    fn arb_message() -> impl Strategy<Value = Message> {
        prop_oneof![
            (any::<u64>(), arb_name(), arb_payload())
                .prop_map(|(id, name, payload)| Message::Request { id: RequestId(id), name, payload }),
            (any::<u64>(), arb_payload())
                .prop_map(|(id, payload)| Message::Reply { id: RequestId(id), payload }),
            (arb_name(), arb_payload())
                .prop_map(|(name, payload)| Message::Signal { name, payload }),
            any::<u64>().prop_map(|id| Message::ReplyInternalError { id: RequestId(id) }),
            any::<u64>().prop_map(|id| Message::ReplyShutdown { id: RequestId(id) }),
        ]
    }

    proptest! {
        #[test]
        fn decode_of_encode_is_identity(message in arb_message()) {
            let mut wire = Vec::new();
            message.encode(&mut wire).expect("valid message encodes");
            let decoded = Message::decode(&wire).expect("encoded message decodes");
            prop_assert_eq!(message, decoded);
        }
    }
}
