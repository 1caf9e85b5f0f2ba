//! Envelope and payload definitions
//!
//! JSON-based relay protocol using Serde's tagged enum for type-safe
//! serialization/deserialization. The unit relayed between clients is an
//! `Envelope`: the sender's identity plus a tagged `Payload`.

use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::types::ClientId;

/// Message payload, the tagged union relayed between clients
///
/// A closed set of kinds, extended by adding variants. Decoding bytes with
/// an unknown `type` tag yields a decode error, never a crash, so old
/// decoders survive newer peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Identity announcement: tells a client the id the hub assigned it
    Id { id: ClientId },
    /// Chat text relayed between clients
    Chat { text: String },
}

impl Payload {
    /// Short name of the payload kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Id { .. } => "id",
            Payload::Chat { .. } => "chat",
        }
    }
}

/// The unit of relay between clients
///
/// Immutable once constructed. A `sender_id` of zero is the "unset"
/// sentinel: the receiving pump rewrites it to the client's own identity
/// before dispatch. This is a convenience default, not a spoofing guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Identity of the client the payload originates from
    pub sender_id: ClientId,
    /// The relayed payload
    pub payload: Payload,
}

impl Envelope {
    /// Encode this envelope to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>, RelayError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode wire bytes into an envelope
    pub fn decode(bytes: &[u8]) -> Result<Envelope, RelayError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serialize_shape() {
        let json = serde_json::to_string(&Payload::Chat {
            text: "hello".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"chat\""));
        assert!(json.contains("\"text\":\"hello\""));

        let json = serde_json::to_string(&Payload::Id { id: ClientId(3) }).unwrap();
        assert!(json.contains("\"type\":\"id\""));
        assert!(json.contains("\"id\":3"));
    }

    #[test]
    fn test_payload_kind_names() {
        assert_eq!(Payload::Id { id: ClientId(1) }.kind(), "id");
        assert_eq!(
            Payload::Chat {
                text: String::new()
            }
            .kind(),
            "chat"
        );
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = Envelope {
            sender_id: ClientId(7),
            payload: Payload::Chat {
                text: "hi there".to_string(),
            },
        };
        let bytes = envelope.encode().unwrap();
        let decoded = Envelope::decode(&bytes).unwrap();
        assert_eq!(decoded.sender_id, ClientId(7));
        match decoded.payload {
            Payload::Chat { text } => assert_eq!(text, "hi there"),
            other => panic!("wrong payload kind: {:?}", other),
        }
    }

    #[test]
    fn test_sender_zero_decodes_as_unset() {
        let bytes = br#"{"sender_id":0,"payload":{"type":"chat","text":"x"}}"#;
        let envelope = Envelope::decode(bytes).unwrap();
        assert!(envelope.sender_id.is_unset());
    }

    #[test]
    fn test_decode_unknown_kind_fails() {
        let bytes = br#"{"sender_id":1,"payload":{"type":"teleport","x":4}}"#;
        assert!(Envelope::decode(bytes).is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Envelope::decode(b"not json at all").is_err());
    }
}
