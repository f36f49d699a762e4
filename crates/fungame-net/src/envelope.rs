//! Event envelopes exchanged on the real-time channel.
//!
//! Every message, in either direction and on either link encoding, is one
//! JSON object:
//!
//! ```text
//! { "event": "join", "data": { "gameId": "g1", "playerId": "p1" }, "ack": 7 }
//! ```
//!
//! `ack` is present on requests that expect an acknowledgement. The server
//! answers such a request with an envelope whose `event` is [`ACK_EVENT`],
//! carrying the same `ack` id and the reply payload in `data`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name of acknowledgement replies.
pub const ACK_EVENT: &str = "ack";

/// One event on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name, e.g. `state_update`.
    pub event: String,
    /// Event payload. Missing payloads decode as `null`.
    #[serde(default)]
    pub data: Value,
    /// Request id for acknowledged requests and their replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
}

impl Envelope {
    /// A fire-and-forget envelope.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            ack: None,
        }
    }

    /// An acknowledgement reply for request `id`.
    pub fn ack_reply(id: u64, data: Value) -> Self {
        Self {
            event: ACK_EVENT.to_string(),
            data,
            ack: Some(id),
        }
    }

    /// Whether this envelope answers an earlier request.
    pub fn is_ack(&self) -> bool {
        self.event == ACK_EVENT && self.ack.is_some()
    }
}

/// Errors that can occur while decoding an envelope.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was empty.
    #[error("empty payload")]
    EmptyPayload,

    /// The payload was not a valid envelope.
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode an envelope as JSON bytes.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, MessageError> {
    Ok(serde_json::to_vec(envelope)?)
}

/// Encode an envelope as a JSON string (WebSocket text frames).
pub fn encode_text(envelope: &Envelope) -> Result<String, MessageError> {
    Ok(serde_json::to_string(envelope)?)
}

/// Decode JSON bytes into an envelope.
pub fn decode(data: &[u8]) -> Result<Envelope, MessageError> {
    if data.is_empty() {
        return Err(MessageError::EmptyPayload);
    }
    Ok(serde_json::from_slice(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_event_has_no_ack_field() {
        let env = Envelope::new("action", json!({"gameId": "g1"}));
        let text = encode_text(&env).unwrap();
        assert!(!text.contains("\"ack\""), "fire-and-forget must omit ack: {text}");
    }

    #[test]
    fn test_missing_data_decodes_as_null() {
        let env = decode(br#"{"event":"connected"}"#).unwrap();
        assert_eq!(env.event, "connected");
        assert_eq!(env.data, Value::Null);
        assert_eq!(env.ack, None);
    }

    #[test]
    fn test_ack_reply_is_recognised() {
        let env = decode(br#"{"event":"ack","ack":3,"data":{"ok":true}}"#).unwrap();
        assert!(env.is_ack());
        assert_eq!(env, Envelope::ack_reply(3, json!({"ok": true})));
    }

    #[test]
    fn test_event_named_ack_without_id_is_not_a_reply() {
        let env = Envelope::new(ACK_EVENT, Value::Null);
        assert!(!env.is_ack());
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(decode(&[]), Err(MessageError::EmptyPayload)));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(decode(b"{not json"), Err(MessageError::Json(_))));
    }
}
