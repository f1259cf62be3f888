//! Per-device document and the merge patch applied to it.

use serde::{Deserialize, Serialize};

use super::{DeviceId, Timestamp, TransactionEvent};

/// Document summarizing one physical device.
///
/// Created on the first write for a `device_id` and merged on every write
/// after that. The bridge never deletes records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Stable device identifier (also the document key).
    pub device_id: DeviceId,
    /// Account the device belongs to, typically an email address.
    #[serde(default)]
    pub owner_identifier: Option<String>,
    /// Last known reachability address of the device.
    #[serde(default)]
    pub network_address: Option<String>,
    /// When the bridge last saw activity from the device.
    #[serde(default)]
    pub last_seen: Option<Timestamp>,
    /// Most recent mirrored transaction.
    #[serde(default)]
    pub latest_transaction: Option<TransactionEvent>,
    /// When the document was last written.
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl DeviceRecord {
    /// Creates an empty record for `device_id`.
    #[must_use]
    pub const fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            owner_identifier: None,
            network_address: None,
            last_seen: None,
            latest_transaction: None,
            updated_at: None,
        }
    }

    /// Merges `patch` into the record. Fields absent from the patch keep
    /// their current value.
    pub fn apply(&mut self, patch: DevicePatch) {
        let DevicePatch {
            owner_identifier,
            network_address,
            last_seen,
            latest_transaction,
            updated_at,
        } = patch;
        if let Some(owner) = owner_identifier {
            self.owner_identifier = Some(owner);
        }
        if let Some(address) = network_address {
            self.network_address = Some(address);
        }
        if let Some(seen) = last_seen {
            self.last_seen = Some(seen);
        }
        if let Some(txn) = latest_transaction {
            self.latest_transaction = Some(txn);
        }
        if let Some(updated) = updated_at {
            self.updated_at = Some(updated);
        }
    }
}

/// Partial update for a [`DeviceRecord`].
///
/// `None` means "leave unchanged"; there is no way to clear a field. The
/// serialized form omits `None` fields so it can be used directly as a
/// JSON merge document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevicePatch {
    /// New owner identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_identifier: Option<String>,
    /// New network address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_address: Option<String>,
    /// New last-seen time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<Timestamp>,
    /// New latest transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_transaction: Option<TransactionEvent>,
    /// New write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl DevicePatch {
    /// A patch that only refreshes `last_seen` and `updated_at` to `now`.
    #[must_use]
    pub const fn touch(now: Timestamp) -> Self {
        Self {
            owner_identifier: None,
            network_address: None,
            last_seen: Some(now),
            latest_transaction: None,
            updated_at: Some(now),
        }
    }

    /// Sets the owner identifier.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner_identifier = Some(owner.into());
        self
    }

    /// Sets the network address.
    #[must_use]
    pub fn with_network_address(mut self, address: impl Into<String>) -> Self {
        self.network_address = Some(address.into());
        self
    }

    /// Sets the latest transaction.
    #[must_use]
    pub fn with_transaction(mut self, txn: TransactionEvent) -> Self {
        self.latest_transaction = Some(txn);
        self
    }

    /// Returns `true` if applying the patch would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.owner_identifier.is_none()
            && self.network_address.is_none()
            && self.last_seen.is_none()
            && self.latest_transaction.is_none()
            && self.updated_at.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn device(id: &str) -> DeviceId {
        let Ok(id) = DeviceId::parse(id) else {
            panic!("valid id");
        };
        id
    }

    #[test]
    fn apply_merges_without_clearing() {
        let mut record = DeviceRecord::new(device("ESP32_001"));
        record.apply(
            DevicePatch::touch(Timestamp::from_millis(1_000))
                .with_owner("owner@example.com")
                .with_network_address("10.0.0.7"),
        );

        record.apply(DevicePatch::touch(Timestamp::from_millis(2_000)));

        assert_eq!(record.owner_identifier.as_deref(), Some("owner@example.com"));
        assert_eq!(record.network_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(record.last_seen, Some(Timestamp::from_millis(2_000)));
    }

    #[test]
    fn patch_serialization_omits_unset_fields() {
        let patch = DevicePatch::default().with_owner("a@b.c");
        let json = serde_json::to_value(&patch).unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "owner_identifier": "a@b.c" }));
    }

    #[test]
    fn empty_patch_is_empty() {
        assert!(DevicePatch::default().is_empty());
        assert!(!DevicePatch::touch(Timestamp::now()).is_empty());
    }

    #[test]
    fn record_deserializes_from_sparse_document() {
        let doc = serde_json::json!({ "device_id": "ESP32_009", "last_seen": 5 });
        let Ok(record) = serde_json::from_value::<DeviceRecord>(doc) else {
            panic!("sparse document should decode");
        };
        assert_eq!(record.device_id, device("ESP32_009"));
        assert_eq!(record.last_seen, Some(Timestamp::from_millis(5)));
        assert_eq!(record.owner_identifier, None);
    }
}
