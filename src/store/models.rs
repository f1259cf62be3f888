//! Raw stream data as it crosses the store boundary.

use serde::{Deserialize, Serialize};

use crate::domain::TransactionEvent;

/// One keyed value under a stream path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    /// Stream-assigned key.
    pub key: String,
    /// Raw value as written by the device.
    pub value: serde_json::Value,
}

impl StreamEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Every retained entry under a path at one point in time, in stream order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    /// Stream path the snapshot was taken from.
    pub path: String,
    /// Entries in stream (insertion) order.
    pub entries: Vec<StreamEntry>,
}

impl StreamSnapshot {
    /// Creates a snapshot from ordered entries.
    #[must_use]
    pub fn new(path: impl Into<String>, entries: Vec<StreamEntry>) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }

    /// Returns `true` if the path holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Decodes every entry, preserving stream order and attaching keys.
    #[must_use]
    pub fn decode(&self) -> Vec<TransactionEvent> {
        self.entries
            .iter()
            .map(|entry| TransactionEvent::decode(&entry.key, &entry.value))
            .collect()
    }
}
