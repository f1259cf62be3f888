//! Domain events published by the bridge.
//!
//! Device document changes and stream notifications are both surfaced as a
//! [`BridgeEvent`] on the [`super::EventBus`], from where WebSocket
//! connections pick them up.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{DeviceId, DeviceRecord, DeviceStatus, TransactionEvent};

/// Domain event emitted after a device write or a stream notification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// A device record was written.
    DeviceUpdated {
        /// Device identifier.
        device_id: DeviceId,
        /// Status computed when the event was emitted.
        status: DeviceStatus,
        /// Full record after the write.
        record: DeviceRecord,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The realtime stream delivered a batch.
    TransactionsObserved {
        /// Number of events in the batch.
        count: usize,
        /// Stream key of the newest event, if any.
        latest_key: Option<String>,
        /// Distinct devices that appear in the batch, in first-seen order.
        device_ids: Vec<DeviceId>,
        /// Every decoded event, in stream order.
        transactions: Vec<TransactionEvent>,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The stream subscription reported an error.
    FeedFailed {
        /// Error message.
        error: String,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl BridgeEvent {
    /// Builds a `TransactionsObserved` event from a decoded batch.
    #[must_use]
    pub fn transactions_observed(transactions: Vec<TransactionEvent>) -> Self {
        Self::observed_at(transactions, Utc::now())
    }

    fn observed_at(transactions: Vec<TransactionEvent>, timestamp: DateTime<Utc>) -> Self {
        let mut device_ids: Vec<DeviceId> = Vec::new();
        for id in transactions.iter().filter_map(|t| t.device_id.as_ref()) {
            if !device_ids.contains(id) {
                device_ids.push(id.clone());
            }
        }
        Self::TransactionsObserved {
            count: transactions.len(),
            latest_key: transactions.last().map(|t| t.key.clone()),
            device_ids,
            transactions,
            timestamp,
        }
    }

    /// Narrows a `TransactionsObserved` batch to the events of devices
    /// accepted by `keep`, recomputing its summary fields. Other variants
    /// are returned unchanged.
    #[must_use]
    pub fn restricted_to(&self, keep: impl Fn(&DeviceId) -> bool) -> Self {
        match self {
            Self::TransactionsObserved {
                transactions,
                timestamp,
                ..
            } => Self::observed_at(
                transactions
                    .iter()
                    .filter(|t| t.device_id.as_ref().is_some_and(&keep))
                    .cloned()
                    .collect(),
                *timestamp,
            ),
            other => other.clone(),
        }
    }

    /// Returns `true` if the event concerns the given device.
    #[must_use]
    pub fn concerns(&self, id: &DeviceId) -> bool {
        match self {
            Self::DeviceUpdated { device_id, .. } => device_id == id,
            Self::TransactionsObserved { device_ids, .. } => device_ids.contains(id),
            Self::FeedFailed { .. } => false,
        }
    }

    /// Returns `true` for events every subscriber should see regardless of
    /// device filters.
    #[must_use]
    pub const fn is_broadcast(&self) -> bool {
        matches!(self, Self::FeedFailed { .. })
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::DeviceUpdated { .. } => "device_updated",
            Self::TransactionsObserved { .. } => "transactions_observed",
            Self::FeedFailed { .. } => "feed_failed",
        }
    }
}
