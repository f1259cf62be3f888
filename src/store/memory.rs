//! In-process store implementations.
//!
//! Used by the default `memory` backend and by tests. Both stores keep a
//! `tokio::sync::RwLock` around their map. The document store fans out
//! every write over a broadcast channel; the stream publishes only its
//! latest snapshot per path over a watch channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast, watch};

use super::models::{StreamEntry, StreamSnapshot};
use super::{DocumentStore, RealtimeStream, WATCH_CAPACITY};
use crate::config::{BridgeConfig, DEFAULT_STREAM_RETAIN_LIMIT};
use crate::domain::{DeviceId, DevicePatch, DeviceRecord, Timestamp};
use crate::error::BridgeError;

/// Device records held in a `HashMap`.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    records: RwLock<HashMap<DeviceId, DeviceRecord>>,
    changes: broadcast::Sender<DeviceRecord>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            records: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns `true` if the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn notify(&self, record: &DeviceRecord) {
        let _ = self.changes.send(record.clone());
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, device_id: &DeviceId) -> Result<Option<DeviceRecord>, BridgeError> {
        Ok(self.records.read().await.get(device_id).cloned())
    }

    async fn merge_upsert(
        &self,
        device_id: &DeviceId,
        patch: DevicePatch,
    ) -> Result<DeviceRecord, BridgeError> {
        let record = {
            let mut map = self.records.write().await;
            let record = map
                .entry(device_id.clone())
                .or_insert_with(|| DeviceRecord::new(device_id.clone()));
            record.apply(patch);
            record.clone()
        };
        self.notify(&record);
        Ok(record)
    }

    async fn update(
        &self,
        device_id: &DeviceId,
        patch: DevicePatch,
    ) -> Result<DeviceRecord, BridgeError> {
        let record = {
            let mut map = self.records.write().await;
            let record = map
                .get_mut(device_id)
                .ok_or_else(|| BridgeError::DeviceNotFound(device_id.to_string()))?;
            record.apply(patch);
            record.clone()
        };
        self.notify(&record);
        Ok(record)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DeviceRecord>, BridgeError> {
        let map = self.records.read().await;
        let mut owned: Vec<DeviceRecord> = map
            .values()
            .filter(|r| r.owner_identifier.as_deref() == Some(owner))
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(owned)
    }

    fn watch(&self) -> broadcast::Receiver<DeviceRecord> {
        self.changes.subscribe()
    }
}

/// Entries and subscribers for one stream path.
#[derive(Debug)]
struct PathLog {
    entries: Vec<StreamEntry>,
    latest: watch::Sender<StreamSnapshot>,
}

impl PathLog {
    fn new(path: &str) -> Self {
        let (latest, _) = watch::channel(StreamSnapshot::new(path, Vec::new()));
        Self {
            entries: Vec::new(),
            latest,
        }
    }
}

/// Append-only stream kept in memory, bounded per path.
///
/// Keys are `"{epoch_ms:013}-{seq:06}"`, so lexical key order matches
/// insertion order.
#[derive(Debug)]
pub struct InMemoryStream {
    paths: RwLock<HashMap<String, PathLog>>,
    next_seq: AtomicU64,
    retain_limit: usize,
}

impl InMemoryStream {
    /// Creates a stream keeping [`DEFAULT_STREAM_RETAIN_LIMIT`] entries
    /// per path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retain_limit(DEFAULT_STREAM_RETAIN_LIMIT)
    }

    /// Creates a stream that keeps at most `limit` entries per path,
    /// dropping the oldest first.
    #[must_use]
    pub fn with_retain_limit(limit: usize) -> Self {
        Self {
            paths: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            retain_limit: limit.max(1),
        }
    }

    /// Creates a stream bounded by `config.stream_retain_limit`.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::with_retain_limit(config.stream_retain_limit)
    }

    /// Returns the per-path entry limit.
    #[must_use]
    pub fn retain_limit(&self) -> usize {
        self.retain_limit
    }

    fn next_key(&self) -> String {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        format!("{:013}-{seq:06}", Timestamp::now().as_millis())
    }
}

impl Default for InMemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeStream for InMemoryStream {
    async fn push(&self, path: &str, value: serde_json::Value) -> Result<String, BridgeError> {
        let mut paths = self.paths.write().await;
        let key = self.next_key();
        let log = paths
            .entry(path.to_string())
            .or_insert_with(|| PathLog::new(path));
        log.entries.push(StreamEntry::new(key.clone(), value));

        let excess = log.entries.len().saturating_sub(self.retain_limit);
        if excess > 0 {
            log.entries.drain(..excess);
        }

        // Replaces the previous snapshot; receivers that have not caught up
        // only ever see the newest one.
        log.latest
            .send_replace(StreamSnapshot::new(path, log.entries.clone()));
        tracing::debug!(path, %key, "stream entry appended");
        Ok(key)
    }

    async fn snapshot(&self, path: &str) -> Result<StreamSnapshot, BridgeError> {
        let paths = self.paths.read().await;
        let entries = paths
            .get(path)
            .map(|log| log.entries.clone())
            .unwrap_or_default();
        Ok(StreamSnapshot::new(path, entries))
    }

    async fn subscribe(
        &self,
        path: &str,
    ) -> Result<watch::Receiver<StreamSnapshot>, BridgeError> {
        let mut paths = self.paths.write().await;
        let log = paths
            .entry(path.to_string())
            .or_insert_with(|| PathLog::new(path));
        Ok(log.latest.subscribe())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(raw: &str) -> DeviceId {
        let Ok(id) = DeviceId::parse(raw) else {
            panic!("valid id");
        };
        id
    }

    #[tokio::test]
    async fn merge_upsert_creates_then_merges() {
        let store = InMemoryDocumentStore::new();
        let device = id("ESP32_001");

        let first = store
            .merge_upsert(&device, DevicePatch::default().with_owner("a@example.com"))
            .await;
        assert!(first.is_ok());

        let second = store
            .merge_upsert(&device, DevicePatch::default().with_network_address("10.0.0.2"))
            .await;
        let Ok(record) = second else {
            panic!("upsert failed");
        };
        assert_eq!(record.owner_identifier.as_deref(), Some("a@example.com"));
        assert_eq!(record.network_address.as_deref(), Some("10.0.0.2"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_requires_existing_record() {
        let store = InMemoryDocumentStore::new();
        let mut changes = store.watch();
        let result = store
            .update(&id("ghost"), DevicePatch::touch(Timestamp::now()))
            .await;
        assert!(matches!(result, Err(BridgeError::DeviceNotFound(_))));
        assert!(store.is_empty().await);

        let mut next = tokio_test::task::spawn(changes.recv());
        tokio_test::assert_pending!(next.poll());
    }

    #[tokio::test]
    async fn list_by_owner_filters_and_sorts() {
        let store = InMemoryDocumentStore::new();
        for (device, owner) in [("B", "x@y.z"), ("A", "x@y.z"), ("C", "other@y.z")] {
            let _ = store
                .merge_upsert(&id(device), DevicePatch::default().with_owner(owner))
                .await;
        }
        let Ok(owned) = store.list_by_owner("x@y.z").await else {
            panic!("list failed");
        };
        let ids: Vec<&str> = owned.iter().map(|r| r.device_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn watch_sees_writes() {
        let store = InMemoryDocumentStore::new();
        let mut rx = store.watch();
        let _ = store
            .merge_upsert(&id("ESP32_001"), DevicePatch::touch(Timestamp::now()))
            .await;
        let Ok(record) = rx.recv().await else {
            panic!("expected change notification");
        };
        assert_eq!(record.device_id.as_str(), "ESP32_001");
    }

    #[tokio::test]
    async fn push_preserves_order_and_unique_keys() {
        let stream = InMemoryStream::new();
        let mut keys = Vec::new();
        for amount in 1..=3 {
            let Ok(key) = stream.push("p", json!({ "amount": amount })).await else {
                panic!("push failed");
            };
            keys.push(key);
        }
        let Ok(snapshot) = stream.snapshot("p").await else {
            panic!("snapshot failed");
        };
        let snap_keys: Vec<String> = snapshot.entries.iter().map(|e| e.key.clone()).collect();
        assert_eq!(snap_keys, keys);

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(sorted, keys);
    }

    #[tokio::test]
    async fn snapshot_of_unknown_path_is_empty() {
        let stream = InMemoryStream::new();
        let Ok(snapshot) = stream.snapshot("nothing/here").await else {
            panic!("snapshot failed");
        };
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn subscribers_get_full_snapshot_after_push() {
        let stream = InMemoryStream::new();
        let Ok(mut rx) = stream.subscribe("p").await else {
            panic!("subscribe failed");
        };
        let _ = stream.push("p", json!({ "amount": 1 })).await;
        assert!(rx.changed().await.is_ok());
        assert_eq!(rx.borrow_and_update().len(), 1);

        let _ = stream.push("p", json!({ "amount": 2 })).await;
        assert!(rx.changed().await.is_ok());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.path, "p");
    }

    #[tokio::test]
    async fn slow_subscriber_only_holds_latest_snapshot() {
        let stream = InMemoryStream::with_retain_limit(3);
        let Ok(mut rx) = stream.subscribe("p").await else {
            panic!("subscribe failed");
        };
        for amount in 1..=10 {
            let _ = stream.push("p", json!({ "amount": amount })).await;
        }

        assert!(rx.changed().await.is_ok());
        let snapshot = rx.borrow_and_update().clone();
        let amounts: Vec<Option<f64>> = snapshot.decode().iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![Some(8.0), Some(9.0), Some(10.0)]);

        let mut next = tokio_test::task::spawn(rx.changed());
        tokio_test::assert_pending!(next.poll());
    }

    #[tokio::test]
    async fn default_stream_is_bounded() {
        let stream = InMemoryStream::new();
        assert_eq!(stream.retain_limit(), DEFAULT_STREAM_RETAIN_LIMIT);
        for amount in 0..DEFAULT_STREAM_RETAIN_LIMIT + 5 {
            let _ = stream.push("p", json!({ "amount": amount })).await;
        }
        let Ok(snapshot) = stream.snapshot("p").await else {
            panic!("snapshot failed");
        };
        assert_eq!(snapshot.len(), DEFAULT_STREAM_RETAIN_LIMIT);
        assert_eq!(snapshot.decode().first().and_then(|t| t.amount), Some(5.0));
    }

    #[tokio::test]
    async fn retain_limit_drops_oldest() {
        let stream = InMemoryStream::with_retain_limit(2);
        for amount in 1..=4 {
            let _ = stream.push("p", json!({ "amount": amount })).await;
        }
        let Ok(snapshot) = stream.snapshot("p").await else {
            panic!("snapshot failed");
        };
        let amounts: Vec<Option<f64>> = snapshot.decode().iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![Some(3.0), Some(4.0)]);
    }
}
