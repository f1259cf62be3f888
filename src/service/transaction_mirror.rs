//! Transaction mirror: copies the newest stream event into the device's
//! document and hands the full decoded batch to a downstream callback.
//!
//! The mirror is a stateless projection. It is driven by stream
//! notifications, processes them one at a time, and writes with merge
//! semantics, so a redelivered batch rewrites the same latest value. There
//! is no retry or deduplication. If two batches are mirrored concurrently
//! the record ends up with whichever upsert completed last.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::config::{BridgeConfig, LatestSelection, MissingDevicePolicy};
use crate::domain::{
    BridgeEvent, DeviceId, DevicePatch, DeviceRecord, EventBus, Timestamp, TransactionEvent,
};
use crate::error::BridgeError;
use crate::store::{DocumentStore, RealtimeStream, StreamSnapshot};

/// What the downstream callback receives for every notification.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    /// Every decoded event of the batch, in stream order.
    Transactions(Vec<TransactionEvent>),
    /// The stream could not be read.
    Failed(String),
}

/// Downstream consumer of stream notifications.
pub type FeedCallback = Arc<dyn Fn(FeedUpdate) + Send + Sync>;

/// Returns a callback that republishes every feed update on `event_bus`.
#[must_use]
pub fn feed_publisher(event_bus: EventBus) -> FeedCallback {
    Arc::new(move |update| {
        let event = match update {
            FeedUpdate::Transactions(transactions) => {
                BridgeEvent::transactions_observed(transactions)
            }
            FeedUpdate::Failed(error) => BridgeEvent::FeedFailed {
                error,
                timestamp: Utc::now(),
            },
        };
        let receivers = event_bus.publish(event);
        tracing::trace!(receivers, "feed update published");
    })
}

/// Result of the mirror write for one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorOutcome {
    /// Empty batch; nothing was written.
    Skipped,
    /// The latest event was merged into the device record.
    Synced {
        /// Device the event was attributed to.
        device_id: DeviceId,
        /// Stream key of the mirrored event.
        key: String,
        /// Record after the write.
        record: DeviceRecord,
    },
    /// The latest event carried no device identifier and was quarantined.
    Rejected {
        /// Stream key of the rejected event.
        key: String,
        /// Why the event was not mirrored.
        reason: String,
    },
    /// The document store write failed.
    Failed {
        /// Device the write targeted.
        device_id: DeviceId,
        /// Stream key of the event.
        key: String,
        /// Store error message.
        error: String,
    },
}

impl MirrorOutcome {
    /// Returns `true` if a write reached the store.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

/// Everything one batch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Every decoded event, in stream order.
    pub transactions: Vec<TransactionEvent>,
    /// Result of the mirror write.
    pub outcome: MirrorOutcome,
}

/// Mirror behavior that is fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct MirrorSettings {
    /// Owner written into every mirrored record, if known.
    pub owner_identifier: Option<String>,
    /// Network address written into every mirrored record, if set.
    pub network_address: Option<String>,
    /// Handling of events without a device identifier.
    pub missing_device_policy: MissingDevicePolicy,
    /// Latest-event selection rule.
    pub latest_selection: LatestSelection,
}

impl MirrorSettings {
    /// Extracts the mirror settings from the bridge configuration.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            owner_identifier: config.owner_identifier.clone(),
            network_address: config.device_network_address.clone(),
            missing_device_policy: config.missing_device_policy.clone(),
            latest_selection: config.latest_selection,
        }
    }
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

/// Projects the realtime transaction stream onto per-device records.
pub struct TransactionMirror {
    documents: Arc<dyn DocumentStore>,
    settings: MirrorSettings,
    callback: FeedCallback,
}

impl fmt::Debug for TransactionMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionMirror")
            .field("documents", &self.documents)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TransactionMirror {
    /// Creates a mirror writing into `documents` and reporting to `callback`.
    #[must_use]
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        settings: MirrorSettings,
        callback: FeedCallback,
    ) -> Self {
        Self {
            documents,
            settings,
            callback,
        }
    }

    /// Handles one stream notification.
    ///
    /// Decodes the batch, mirrors the latest event, then passes every
    /// decoded event to the callback. The callback runs whatever the
    /// mirror outcome was.
    pub async fn on_stream_batch(&self, snapshot: &StreamSnapshot) -> BatchReport {
        let transactions = snapshot.decode();
        tracing::debug!(
            path = %snapshot.path,
            count = transactions.len(),
            "stream batch received"
        );

        let outcome = match select_latest(&transactions, self.settings.latest_selection) {
            Some(latest) => self.sync_latest(latest.clone()).await,
            None => MirrorOutcome::Skipped,
        };

        (self.callback)(FeedUpdate::Transactions(transactions.clone()));

        BatchReport {
            transactions,
            outcome,
        }
    }

    /// Merges one event into its device's record.
    ///
    /// Sets `latest_transaction`, refreshes `last_seen`, and writes the
    /// configured owner and network address. Store errors are logged and
    /// returned as [`MirrorOutcome::Failed`].
    pub async fn sync_latest(&self, latest: TransactionEvent) -> MirrorOutcome {
        let key = latest.key.clone();
        let device_id = match (&latest.device_id, &self.settings.missing_device_policy) {
            (Some(id), _) => id.clone(),
            (None, MissingDevicePolicy::Fallback(fallback)) => {
                tracing::warn!(%key, device_id = %fallback, "event has no device id, using fallback");
                fallback.clone()
            }
            (None, MissingDevicePolicy::Reject) => {
                tracing::warn!(%key, "event has no device id, not mirrored");
                let reason = BridgeError::MissingDeviceId { key: key.clone() }.to_string();
                return MirrorOutcome::Rejected { key, reason };
            }
        };

        let amount = latest.amount;
        let mut patch = DevicePatch::touch(Timestamp::now()).with_transaction(latest);
        if let Some(owner) = &self.settings.owner_identifier {
            patch = patch.with_owner(owner.clone());
        }
        if let Some(address) = &self.settings.network_address {
            patch = patch.with_network_address(address.clone());
        }

        match self.documents.merge_upsert(&device_id, patch).await {
            Ok(record) => {
                tracing::info!(%device_id, %key, ?amount, "transaction mirrored");
                MirrorOutcome::Synced {
                    device_id,
                    key,
                    record,
                }
            }
            Err(e) => {
                tracing::error!(%device_id, %key, error = %e, "failed to mirror transaction");
                MirrorOutcome::Failed {
                    device_id,
                    key,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Spawns [`Self::run`] on the Tokio runtime.
    pub fn spawn(
        self: Arc<Self>,
        stream: Arc<dyn RealtimeStream>,
        path: impl Into<String>,
    ) -> JoinHandle<()> {
        let path = path.into();
        tokio::spawn(async move { self.run(stream.as_ref(), &path).await })
    }

    /// Subscribes to `path` and mirrors every notification until the stream
    /// closes.
    ///
    /// The current snapshot is processed once right after subscribing.
    /// Snapshots published while a batch is being mirrored collapse into
    /// the newest one.
    pub async fn run(&self, stream: &dyn RealtimeStream, path: &str) {
        let mut rx = match stream.subscribe(path).await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::error!(path, error = %e, "failed to subscribe to transaction stream");
                (self.callback)(FeedUpdate::Failed(e.to_string()));
                return;
            }
        };
        tracing::info!(path, "transaction mirror listening");

        self.resync(stream, path).await;

        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            let _ = self.on_stream_batch(&snapshot).await;
        }

        tracing::info!(path, "transaction stream closed");
    }

    async fn resync(&self, stream: &dyn RealtimeStream, path: &str) {
        match stream.snapshot(path).await {
            Ok(snapshot) => {
                let _ = self.on_stream_batch(&snapshot).await;
            }
            Err(e) => {
                tracing::error!(path, error = %e, "failed to read transaction stream");
                (self.callback)(FeedUpdate::Failed(e.to_string()));
            }
        }
    }
}

/// Picks the event to mirror from a decoded batch.
///
/// [`LatestSelection::StreamOrder`] takes the last element.
/// [`LatestSelection::Sequence`] takes the highest `seq` (later position
/// wins ties) and falls back to the last element when no event has one.
#[must_use]
pub fn select_latest(
    transactions: &[TransactionEvent],
    selection: LatestSelection,
) -> Option<&TransactionEvent> {
    match selection {
        LatestSelection::StreamOrder => transactions.last(),
        LatestSelection::Sequence => transactions
            .iter()
            .enumerate()
            .filter_map(|(pos, t)| t.seq.map(|seq| (seq, pos, t)))
            .max_by_key(|(seq, pos, _)| (*seq, *pos))
            .map(|(_, _, t)| t)
            .or_else(|| transactions.last()),
    }
}
