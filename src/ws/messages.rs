//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    #[serde(default)]
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp. Optional on client messages.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Server-initiated event with a fresh id.
    #[must_use]
    pub fn event(payload: serde_json::Value) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), WsMessageType::Event, payload)
    }

    /// Response to the client request `id`.
    #[must_use]
    pub fn response(id: String, payload: serde_json::Value) -> Self {
        Self::new(id, WsMessageType::Response, payload)
    }

    /// Error reply with an HTTP-like status code.
    #[must_use]
    pub fn error(id: String, code: u16, message: &str) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message }),
        )
    }

    fn new(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket, carried in the payload
/// of a `command` message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Subscribe to events for specific devices.
    Subscribe {
        /// Device IDs to subscribe to. Use `["*"]` for all devices.
        device_ids: Vec<String>,
    },
    /// Unsubscribe from events for specific devices.
    Unsubscribe {
        /// Device IDs to unsubscribe from. `"*"` drops the wildcard.
        device_ids: Vec<String>,
    },
    /// Fetch one device record with its current status.
    GetDevice {
        /// Target device ID.
        device_id: String,
    },
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn client_envelope_defaults_timestamp() {
        let raw = r#"{"id":"1","type":"command","payload":{"command":"subscribe","device_ids":["*"]}}"#;
        let Ok(msg) = serde_json::from_str::<WsMessage>(raw) else {
            panic!("envelope should parse");
        };
        assert_eq!(msg.msg_type, WsMessageType::Command);

        let Ok(cmd) = serde_json::from_value::<WsCommand>(msg.payload) else {
            panic!("command should parse");
        };
        assert_eq!(
            cmd,
            WsCommand::Subscribe {
                device_ids: vec!["*".to_string()]
            }
        );
    }

    #[test]
    fn error_reply_carries_code() {
        let msg = WsMessage::error("7".to_string(), 404, "unknown command");
        let json = serde_json::to_value(&msg).unwrap_or_default();
        assert_eq!(json["type"], "error");
        assert_eq!(json["id"], "7");
        assert_eq!(json["payload"]["code"], 404);
    }
}
