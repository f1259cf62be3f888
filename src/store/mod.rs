//! Store boundary: the document store holding device records and the
//! realtime append stream carrying transaction events.
//!
//! Both are traits so that the mirror and the services receive their
//! store handles explicitly. [`memory`] provides in-process
//! implementations of both; [`postgres`] provides a durable document store.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::domain::{DeviceId, DevicePatch, DeviceRecord};
use crate::error::BridgeError;

pub use memory::{InMemoryDocumentStore, InMemoryStream};
pub use models::{StreamEntry, StreamSnapshot};
pub use postgres::PostgresDocumentStore;

/// Buffer size of the change feed each document store keeps.
pub const WATCH_CAPACITY: usize = 256;

/// Per-key document store for [`DeviceRecord`]s.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Fetches a record, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::StoreUnavailable`] if the store cannot be read.
    async fn get(&self, device_id: &DeviceId) -> Result<Option<DeviceRecord>, BridgeError>;

    /// Merges `patch` into the record, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::StoreUnavailable`] if the write fails.
    async fn merge_upsert(
        &self,
        device_id: &DeviceId,
        patch: DevicePatch,
    ) -> Result<DeviceRecord, BridgeError>;

    /// Merges `patch` into an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DeviceNotFound`] if no record exists, or
    /// [`BridgeError::StoreUnavailable`] if the write fails.
    async fn update(
        &self,
        device_id: &DeviceId,
        patch: DevicePatch,
    ) -> Result<DeviceRecord, BridgeError>;

    /// Returns every record owned by `owner`, ordered by device id.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::StoreUnavailable`] if the store cannot be read.
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DeviceRecord>, BridgeError>;

    /// Subscribes to the records written from now on.
    fn watch(&self) -> broadcast::Receiver<DeviceRecord>;
}

/// Append-only realtime stream of raw JSON values grouped by path.
#[async_trait]
pub trait RealtimeStream: Send + Sync + fmt::Debug {
    /// Appends `value` under `path` and returns its stream key.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::StoreUnavailable`] if the append fails.
    async fn push(&self, path: &str, value: serde_json::Value) -> Result<String, BridgeError>;

    /// One-shot read of every retained entry under `path`, in stream order.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::StoreUnavailable`] if the stream cannot be read.
    async fn snapshot(&self, path: &str) -> Result<StreamSnapshot, BridgeError>;

    /// Subscribes to the latest full snapshot of `path`.
    ///
    /// The receiver holds only the newest snapshot; a subscriber that
    /// falls behind skips straight to the current state.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::StoreUnavailable`] if the subscription cannot
    /// be established.
    async fn subscribe(
        &self,
        path: &str,
    ) -> Result<watch::Receiver<StreamSnapshot>, BridgeError>;
}
