//! Device service: reads and writes device records and fans store changes
//! out to the event bus.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::domain::{
    BridgeEvent, DeviceId, DevicePatch, DeviceRecord, DeviceStatus, EventBus, Timestamp,
    TransactionEvent, format_last_seen, liveness,
};
use crate::error::BridgeError;
use crate::store::DocumentStore;

/// A device record together with its computed liveness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceView {
    /// The stored record.
    #[serde(flatten)]
    pub record: DeviceRecord,
    /// Status at the time the view was built.
    pub status: DeviceStatus,
    /// `last_seen` as RFC 3339, or `"Never"`.
    pub last_seen_formatted: String,
}

impl DeviceView {
    /// Builds the view of `record` as of `now`.
    #[must_use]
    pub fn at(record: DeviceRecord, now: Timestamp) -> Self {
        Self {
            status: liveness::device_status_at(Some(&record), now),
            last_seen_formatted: format_last_seen(record.last_seen),
            record,
        }
    }

    /// Builds the view of `record` as of the current wall clock.
    #[must_use]
    pub fn now(record: DeviceRecord) -> Self {
        Self::at(record, Timestamp::now())
    }
}

/// Orchestrates device record operations.
///
/// Every write refreshes `last_seen` and `updated_at`. Events are not
/// published directly by the write methods; [`Self::spawn_change_forwarder`]
/// publishes one `DeviceUpdated` per store write, including writes made by
/// the transaction mirror.
#[derive(Debug, Clone)]
pub struct DeviceService {
    documents: Arc<dyn DocumentStore>,
    event_bus: EventBus,
}

impl DeviceService {
    /// Creates a new `DeviceService`.
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>, event_bus: EventBus) -> Self {
        Self {
            documents,
            event_bus,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Lists every device owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidRequest`] for a blank owner, or the
    /// store error if the listing fails.
    pub async fn user_devices(&self, owner: &str) -> Result<Vec<DeviceView>, BridgeError> {
        let owner = require_text("owner", owner)?;
        let now = Timestamp::now();
        let records = self.documents.list_by_owner(owner).await?;
        Ok(records
            .into_iter()
            .map(|record| DeviceView::at(record, now))
            .collect())
    }

    /// Fetches one device.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DeviceNotFound`] if no record exists.
    pub async fn device(&self, device_id: &DeviceId) -> Result<DeviceView, BridgeError> {
        self.documents
            .get(device_id)
            .await?
            .map(DeviceView::now)
            .ok_or_else(|| BridgeError::DeviceNotFound(device_id.to_string()))
    }

    /// Creates or merges a device record.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails.
    pub async fn update_device(
        &self,
        device_id: &DeviceId,
        patch: DevicePatch,
    ) -> Result<DeviceView, BridgeError> {
        let now = Timestamp::now();
        let patch = DevicePatch {
            last_seen: Some(now),
            updated_at: Some(now),
            ..patch
        };
        let record = self.documents.merge_upsert(device_id, patch).await?;
        tracing::info!(%device_id, "device updated");
        Ok(DeviceView::at(record, now))
    }

    /// Records a new network address for an existing device.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidRequest`] for a blank address and
    /// [`BridgeError::DeviceNotFound`] if the device does not exist.
    pub async fn update_network_address(
        &self,
        device_id: &DeviceId,
        address: &str,
    ) -> Result<DeviceView, BridgeError> {
        let address = require_text("network_address", address)?;
        let now = Timestamp::now();
        let record = self
            .documents
            .update(device_id, DevicePatch::touch(now).with_network_address(address))
            .await?;
        tracing::info!(%device_id, address, "device network address updated");
        Ok(DeviceView::at(record, now))
    }

    /// Replaces the latest transaction of an existing device.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DeviceNotFound`] if the device does not exist.
    pub async fn update_transaction_data(
        &self,
        device_id: &DeviceId,
        transaction: TransactionEvent,
    ) -> Result<DeviceView, BridgeError> {
        let now = Timestamp::now();
        let record = self
            .documents
            .update(device_id, DevicePatch::touch(now).with_transaction(transaction))
            .await?;
        Ok(DeviceView::at(record, now))
    }

    /// Marks an existing device as active on behalf of `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidRequest`] for a blank owner and
    /// [`BridgeError::DeviceNotFound`] if the device does not exist.
    pub async fn touch_from_realtime(
        &self,
        device_id: &DeviceId,
        owner: &str,
    ) -> Result<DeviceView, BridgeError> {
        let owner = require_text("owner", owner)?;
        let now = Timestamp::now();
        let record = self
            .documents
            .update(device_id, DevicePatch::touch(now).with_owner(owner))
            .await?;
        tracing::debug!(%device_id, "device heartbeat");
        Ok(DeviceView::at(record, now))
    }

    /// Forwards every store write to the event bus as `DeviceUpdated`.
    pub fn spawn_change_forwarder(&self) -> JoinHandle<()> {
        let mut changes = self.documents.watch();
        let event_bus = self.event_bus.clone();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(record) => {
                        let view = DeviceView::now(record);
                        let _ = event_bus.publish(BridgeEvent::DeviceUpdated {
                            device_id: view.record.device_id.clone(),
                            status: view.status,
                            record: view.record,
                            timestamp: Utc::now(),
                        });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "device change feed lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str, BridgeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}
