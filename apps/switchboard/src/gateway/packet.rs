//! Control packets exchanged over the gateway socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespace every connection may join without configuration.
pub const ROOT_NAMESPACE: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    Error,
}

/// A message in either direction over the gateway.
///
/// `nsp` selects the namespace. On a `disconnect` packet an empty `nsp`
/// addresses the whole connection rather than one namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    #[serde(rename = "type")]
    pub kind: PacketKind,
    #[serde(default = "root_namespace")]
    pub nsp: String,
    /// Ack correlation ID: on an `event`, asks the peer to reply; on an
    /// `ack`, names the event being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Value,
}

fn root_namespace() -> String {
    ROOT_NAMESPACE.to_string()
}

impl Packet {
    fn new(kind: PacketKind, nsp: &str) -> Self {
        Self {
            kind,
            nsp: nsp.to_string(),
            id: None,
            event: None,
            data: Value::Null,
        }
    }

    /// Confirms a namespace join.
    pub fn connect(nsp: &str) -> Self {
        Self::new(PacketKind::Connect, nsp)
    }

    /// Leaves one namespace.
    pub fn disconnect(nsp: &str) -> Self {
        Self::new(PacketKind::Disconnect, nsp)
    }

    /// Tears down the whole connection.
    pub fn disconnect_all() -> Self {
        Self::new(PacketKind::Disconnect, "")
    }

    pub fn event(nsp: &str, name: &str, data: Value) -> Self {
        Self {
            event: Some(name.to_string()),
            data,
            ..Self::new(PacketKind::Event, nsp)
        }
    }

    pub fn ack(nsp: &str, id: u64, data: Value) -> Self {
        Self {
            id: Some(id),
            data,
            ..Self::new(PacketKind::Ack, nsp)
        }
    }

    pub fn error(nsp: &str, reason: &str) -> Self {
        Self {
            data: serde_json::json!({ "reason": reason }),
            ..Self::new(PacketKind::Error, nsp)
        }
    }

    /// Whether this is a `disconnect` aimed at the whole connection.
    pub fn is_connection_disconnect(&self) -> bool {
        self.kind == PacketKind::Disconnect && self.nsp.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_connect_into_root_namespace() {
        let packet: Packet = serde_json::from_str(r#"{"type":"connect"}"#).unwrap();
        assert_eq!(packet.kind, PacketKind::Connect);
        assert_eq!(packet.nsp, "/");
        assert_eq!(packet.data, Value::Null);
    }

    #[test]
    fn event_with_ack_id_serializes_all_fields() {
        let mut packet = Packet::event("/chat", "message", serde_json::json!({"text": "hi"}));
        packet.id = Some(7);
        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["nsp"], "/chat");
        assert_eq!(json["id"], 7);
        assert_eq!(json["event"], "message");
        assert_eq!(json["data"]["text"], "hi");
    }

    #[test]
    fn connect_omits_optional_fields() {
        let json = serde_json::to_value(Packet::connect("/game")).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("event").is_none());
    }

    #[test]
    fn empty_namespace_disconnect_targets_connection() {
        assert!(Packet::disconnect_all().is_connection_disconnect());
        assert!(!Packet::disconnect("/chat").is_connection_disconnect());

        let parsed: Packet = serde_json::from_str(r#"{"type":"disconnect","nsp":""}"#).unwrap();
        assert!(parsed.is_connection_disconnect());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<Packet>(r#"{"type":"noop"}"#).is_err());
    }
}
