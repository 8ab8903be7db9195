// Message types carried on the peer mesh.
//
// `Envelope` is the single wire record: one JSON object per newline-terminated
// line. The `type` field stays a plain string at this layer — the mesh never
// interprets it, and a peer running a newer protocol revision may send kinds
// this build does not know. `MessageKind` is the typed vocabulary the game
// layer speaks; converting an envelope's kind to it is where unknown kinds
// are rejected (and then logged and dropped, never disconnected).
//
// Payloads are opaque UTF-8 byte strings (a move, a peer id, a newline-joined
// move history). On the wire they are base64, matching how the directory side
// encodes binary fields in JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::PeerId;

/// The typed message vocabulary of the coordination protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Game start: payload is the peer id that owns the first turn.
    DefineTurn,
    /// A move: payload is the move string.
    NewMove,
    /// The sender has given up; receivers refetch the authoritative outcome.
    Abandon,
    /// A recovering node asks peers for state: payload is its peer id.
    Restore,
    /// Reply to `Restore`, sent to the source only: newline-joined history.
    RestoreAck,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DefineTurn => "define-turn",
            Self::NewMove => "new-move",
            Self::Abandon => "abandon",
            Self::Restore => "restore",
            Self::RestoreAck => "restore-ack",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, UnknownKind> {
        match s {
            "define-turn" => Ok(Self::DefineTurn),
            "new-move" => Ok(Self::NewMove),
            "abandon" => Ok(Self::Abandon),
            "restore" => Ok(Self::Restore),
            "restore-ack" => Ok(Self::RestoreAck),
            other => Err(UnknownKind(other.to_owned())),
        }
    }
}

/// A message kind this build of the protocol does not understand.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown message kind `{0}`")]
pub struct UnknownKind(pub String);

/// One wire record. Serialized as a single JSON line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub timestamp: i64,
    pub source: PeerId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(timestamp: i64, source: PeerId, kind: MessageKind, payload: Vec<u8>) -> Self {
        Self {
            timestamp,
            source,
            kind: kind.as_str().to_owned(),
            payload,
        }
    }

    /// The typed kind, if this build knows it.
    pub fn message_kind(&self) -> Result<MessageKind, UnknownKind> {
        self.kind.parse()
    }

    /// The payload as UTF-8 text (lossy — payloads are produced as UTF-8
    /// but arrive from the network).
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Serde adapter: `Vec<u8>` as a base64 string.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_are_stable() {
        for kind in [
            MessageKind::DefineTurn,
            MessageKind::NewMove,
            MessageKind::Abandon,
            MessageKind::Restore,
            MessageKind::RestoreAck,
        ] {
            assert_eq!(kind.as_str().parse::<MessageKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let err = "promote-pawn".parse::<MessageKind>().unwrap_err();
        assert_eq!(err, UnknownKind("promote-pawn".into()));
    }

    #[test]
    fn payload_is_base64_on_the_wire() {
        let envelope = Envelope::new(
            1_700_000_000,
            PeerId::new("brave-falcon", 1),
            MessageKind::NewMove,
            b"e2e4".to_vec(),
        );
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"type\":\"new-move\""));
        assert!(json.contains("\"payload\":\"ZTJlNA==\""));
        assert!(json.contains("\"source\":\"brave-falcon-1\""));

        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
        assert_eq!(back.payload_str(), "e2e4");
    }

    #[test]
    fn foreign_kind_still_parses_as_envelope() {
        // A newer peer may send kinds we do not know. The envelope itself
        // must survive deserialization; only the typed conversion fails.
        let json = r#"{"timestamp":1,"source":"x-1","type":"future-kind","payload":""}"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert!(envelope.message_kind().is_err());
    }
}
