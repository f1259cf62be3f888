//! Transaction events as reported by devices into the realtime stream.
//!
//! Device firmware is not consistent about field names or value types, so
//! [`TransactionEvent::decode`] is deliberately lenient: camelCase and
//! snake_case keys are both read, amounts may be numbers or numeric
//! strings, and timestamps go through [`Timestamp::from_raw`]. Fields that
//! cannot be read are left as `None` rather than failing the whole batch.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{DeviceId, Timestamp};

/// Direction or tag of a transaction.
///
/// Devices mostly send `"credit"` / `"debit"`, but some firmware puts the
/// payment channel here instead; those values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionKind {
    /// Money received.
    Credit,
    /// Money paid out.
    Debit,
    /// Any other tag, stored as sent.
    Other(String),
}

impl TransactionKind {
    /// Returns the wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for TransactionKind {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "credit" => Self::Credit,
            "debit" => Self::Debit,
            _ => Self::Other(raw),
        }
    }
}

impl From<TransactionKind> for String {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one cash / UPI / card transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    /// Stream-assigned key, unique within the stream path.
    pub key: String,
    /// Reporting device, if the event carried one.
    #[serde(default)]
    pub device_id: Option<DeviceId>,
    /// Transaction amount.
    #[serde(default)]
    pub amount: Option<f64>,
    /// Credit / debit or a payment-method tag.
    #[serde(default, rename = "type")]
    pub kind: Option<TransactionKind>,
    /// Free-text note.
    #[serde(default)]
    pub note: Option<String>,
    /// Payment channel (`"cash"`, `"upi"`, `"card"`, ...).
    #[serde(default)]
    pub method: Option<String>,
    /// When the device says the transaction happened.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    /// Account tag the device attached, if any.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Explicit ordering sequence, if the device provides one.
    #[serde(default)]
    pub seq: Option<u64>,
}

impl TransactionEvent {
    /// Decodes a raw stream value, attaching the entry's stream key.
    ///
    /// Non-object values decode to an event carrying only its key.
    #[must_use]
    pub fn decode(key: &str, value: &serde_json::Value) -> Self {
        let field = |names: &[&str]| names.iter().find_map(|name| value.get(*name));

        Self {
            key: key.to_string(),
            device_id: field(&["deviceId", "device_id"])
                .and_then(serde_json::Value::as_str)
                .and_then(|raw| DeviceId::parse(raw).ok()),
            amount: field(&["amount"]).and_then(decode_amount),
            kind: field(&["type", "kind"])
                .and_then(serde_json::Value::as_str)
                .filter(|raw| !raw.trim().is_empty())
                .map(|raw| TransactionKind::from(raw.to_string())),
            note: field(&["note"]).and_then(decode_text),
            method: field(&["method"]).and_then(decode_text),
            timestamp: field(&["timestamp"]).and_then(Timestamp::from_raw),
            user_id: field(&["userId", "user_id"]).and_then(decode_text),
            seq: field(&["seq", "sequence"]).and_then(decode_seq),
        }
    }
}

fn decode_amount(value: &serde_json::Value) -> Option<f64> {
    let amount = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    amount.is_finite().then_some(amount)
}

fn decode_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decode_seq(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_camel_case_device_payload() {
        let raw = json!({
            "deviceId": "ESP32_001",
            "amount": 2450,
            "type": "credit",
            "note": "chai stall",
            "method": "upi",
            "timestamp": 1_700_000_000,
            "userId": "owner@example.com"
        });
        let event = TransactionEvent::decode("-N001", &raw);

        assert_eq!(event.key, "-N001");
        assert_eq!(event.device_id.as_ref().map(DeviceId::as_str), Some("ESP32_001"));
        assert_eq!(event.amount, Some(2450.0));
        assert_eq!(event.kind, Some(TransactionKind::Credit));
        assert_eq!(event.note.as_deref(), Some("chai stall"));
        assert_eq!(event.method.as_deref(), Some("upi"));
        assert_eq!(event.timestamp, Some(Timestamp::from_millis(1_700_000_000_000)));
        assert_eq!(event.user_id.as_deref(), Some("owner@example.com"));
        assert_eq!(event.seq, None);
    }

    #[test]
    fn decodes_snake_case_and_string_amount() {
        let raw = json!({
            "device_id": "ESP32_002",
            "amount": " 99.5 ",
            "type": "DEBIT",
            "timestamp": "2023-11-14T22:13:20Z",
            "seq": "42"
        });
        let event = TransactionEvent::decode("-N002", &raw);

        assert_eq!(event.device_id.as_ref().map(DeviceId::as_str), Some("ESP32_002"));
        assert_eq!(event.amount, Some(99.5));
        assert_eq!(event.kind, Some(TransactionKind::Debit));
        assert_eq!(event.seq, Some(42));
    }

    #[test]
    fn missing_fields_stay_none() {
        let event = TransactionEvent::decode("-N003", &json!({ "amount": "n/a", "deviceId": "  " }));
        assert_eq!(event.device_id, None);
        assert_eq!(event.amount, None);
        assert_eq!(event.timestamp, None);
        assert_eq!(event.kind, None);
    }

    #[test]
    fn non_object_decodes_to_key_only() {
        let event = TransactionEvent::decode("-N004", &json!(17));
        assert_eq!(event.key, "-N004");
        assert_eq!(event.amount, None);
    }

    #[test]
    fn payment_channel_in_type_is_kept_verbatim() {
        let event = TransactionEvent::decode("-N005", &json!({ "type": "UPI" }));
        assert_eq!(event.kind, Some(TransactionKind::Other("UPI".to_string())));
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["type"], "UPI");
    }
}
