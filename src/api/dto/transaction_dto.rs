//! Transaction DTOs for the stream read and append endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::TransactionEvent;

/// One decoded stream event.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TransactionDto {
    /// Stream key.
    pub key: String,
    /// Reporting device, if known.
    pub device_id: Option<String>,
    /// Transaction amount.
    pub amount: Option<f64>,
    /// `"credit"`, `"debit"` or a payment-method tag.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Free-text note.
    pub note: Option<String>,
    /// Payment channel.
    pub method: Option<String>,
    /// Device-reported time, epoch milliseconds.
    pub timestamp: Option<i64>,
    /// Account tag attached by the device.
    pub user_id: Option<String>,
    /// Explicit ordering sequence.
    pub seq: Option<u64>,
}

impl From<TransactionEvent> for TransactionDto {
    fn from(event: TransactionEvent) -> Self {
        Self {
            key: event.key,
            device_id: event.device_id.map(String::from),
            amount: event.amount,
            kind: event.kind.map(String::from),
            note: event.note,
            method: event.method,
            timestamp: event.timestamp.map(|t| t.as_millis()),
            user_id: event.user_id,
            seq: event.seq,
        }
    }
}

/// Response body for `GET /transactions`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    /// Stream path that was read.
    pub path: String,
    /// Number of retained events.
    pub count: usize,
    /// Events in stream order.
    pub data: Vec<TransactionDto>,
}

/// Request body for `POST /transactions`: a raw device payload.
///
/// Accepted fields mirror what device firmware sends (`deviceId`,
/// `amount`, `type`, `note`, `method`, `timestamp`, `userId`, `seq`). The
/// payload is stored verbatim and decoded leniently on read.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct ReportTransactionRequest(pub serde_json::Value);
