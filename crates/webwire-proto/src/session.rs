//! JSON session descriptor carried in session notification payloads.

use serde::{Deserialize, Serialize};

/// Wire representation of a session, as carried by `NotifySessionCreated`
/// and successful `RequestRestoreSession` replies.
///
/// Field names are short (`k`/`c`/`i`) to match the original source's
/// on-the-wire JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Session key.
    #[serde(rename = "k")]
    pub key: String,
    /// Creation time, Unix nanoseconds.
    #[serde(rename = "c")]
    pub creation: u64,
    /// User-defined session info, opaque to the protocol.
    #[serde(rename = "i", default, skip_serializing_if = "serde_json::Value::is_null")]
    pub info: serde_json::Value,
}

impl SessionDescriptor {
    /// Serialize to the bytes carried in a message payload.
    ///
    /// # Errors
    ///
    /// Returns an error only if `info` contains a non-serializable value,
    /// which cannot happen for `serde_json::Value`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse from the bytes carried in a message payload.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not valid JSON matching this shape.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let descriptor = SessionDescriptor {
            key: "abc123".to_string(),
            creation: 1_700_000_000_000_000_000,
            info: serde_json::json!({"role": "admin"}),
        };
        let bytes = descriptor.to_bytes().expect("serialize");
        let parsed = SessionDescriptor::from_bytes(&bytes).expect("parse");
        assert_eq!(descriptor, parsed);
    }

    #[test]
    fn null_info_round_trips() {
        let descriptor = SessionDescriptor {
            key: "k".to_string(),
            creation: 0,
            info: serde_json::Value::Null,
        };
        let bytes = descriptor.to_bytes().expect("serialize");
        let parsed = SessionDescriptor::from_bytes(&bytes).expect("parse");
        assert_eq!(descriptor, parsed);
    }
}
