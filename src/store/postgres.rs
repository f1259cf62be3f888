//! PostgreSQL implementation of the document store.
//!
//! Each device is one row holding a JSONB document. Merge semantics come
//! from the JSONB concatenation operator (`doc || patch`), which replaces
//! top-level keys present in the patch and keeps everything else.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::broadcast;

use super::{DocumentStore, WATCH_CAPACITY};
use crate::config::BridgeConfig;
use crate::domain::{DeviceId, DevicePatch, DeviceRecord};
use crate::error::BridgeError;

/// PostgreSQL-backed document store using `sqlx::PgPool`.
///
/// The change feed only sees writes made through this instance.
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
    changes: broadcast::Sender<DeviceRecord>,
}

impl PostgresDocumentStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let (changes, _) = broadcast::channel(WATCH_CAPACITY);
        Self { pool, changes }
    }

    /// Connects using the database settings in `config` and applies the
    /// embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::StoreUnavailable`] if the database cannot be
    /// reached or a migration fails.
    pub async fn connect(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| BridgeError::StoreUnavailable(e.to_string()))?;

        tracing::info!(
            max_connections = config.database_max_connections,
            "connected to postgres document store"
        );
        Ok(Self::new(pool))
    }

    fn notify(&self, record: &DeviceRecord) {
        let _ = self.changes.send(record.clone());
    }
}

/// Builds the JSONB merge document for `patch`, always carrying the id so
/// a freshly inserted row decodes as a [`DeviceRecord`].
fn merge_document(
    device_id: &DeviceId,
    patch: &DevicePatch,
) -> Result<serde_json::Value, BridgeError> {
    let mut doc = serde_json::to_value(patch)?;
    if let serde_json::Value::Object(map) = &mut doc {
        map.insert(
            "device_id".to_string(),
            serde_json::Value::String(device_id.to_string()),
        );
    }
    Ok(doc)
}

fn decode_record(doc: serde_json::Value) -> Result<DeviceRecord, BridgeError> {
    Ok(serde_json::from_value(doc)?)
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, device_id: &DeviceId) -> Result<Option<DeviceRecord>, BridgeError> {
        let doc = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT doc FROM devices WHERE device_id = $1",
        )
        .bind(device_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        doc.map(decode_record).transpose()
    }

    async fn merge_upsert(
        &self,
        device_id: &DeviceId,
        patch: DevicePatch,
    ) -> Result<DeviceRecord, BridgeError> {
        let doc = merge_document(device_id, &patch)?;
        let merged = sqlx::query_scalar::<_, serde_json::Value>(
            "INSERT INTO devices (device_id, doc, updated_at) VALUES ($1, $2, now()) \
             ON CONFLICT (device_id) DO UPDATE \
             SET doc = devices.doc || EXCLUDED.doc, updated_at = now() \
             RETURNING doc",
        )
        .bind(device_id.as_str())
        .bind(&doc)
        .fetch_one(&self.pool)
        .await?;

        let record = decode_record(merged)?;
        self.notify(&record);
        Ok(record)
    }

    async fn update(
        &self,
        device_id: &DeviceId,
        patch: DevicePatch,
    ) -> Result<DeviceRecord, BridgeError> {
        let doc = merge_document(device_id, &patch)?;
        let merged = sqlx::query_scalar::<_, serde_json::Value>(
            "UPDATE devices SET doc = doc || $2, updated_at = now() \
             WHERE device_id = $1 RETURNING doc",
        )
        .bind(device_id.as_str())
        .bind(&doc)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| BridgeError::DeviceNotFound(device_id.to_string()))?;

        let record = decode_record(merged)?;
        self.notify(&record);
        Ok(record)
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DeviceRecord>, BridgeError> {
        let docs = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT doc FROM devices WHERE doc->>'owner_identifier' = $1 ORDER BY device_id",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        docs.into_iter().map(decode_record).collect()
    }

    fn watch(&self) -> broadcast::Receiver<DeviceRecord> {
        self.changes.subscribe()
    }
}
