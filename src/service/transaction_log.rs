//! Direct access to the transaction stream: one-shot reads and appends.

use std::sync::Arc;

use crate::domain::TransactionEvent;
use crate::error::BridgeError;
use crate::store::RealtimeStream;

/// Reads and appends transaction events under one stream path.
#[derive(Debug, Clone)]
pub struct TransactionLog {
    stream: Arc<dyn RealtimeStream>,
    path: String,
}

impl TransactionLog {
    /// Creates a log over `path` of `stream`.
    #[must_use]
    pub fn new(stream: Arc<dyn RealtimeStream>, path: impl Into<String>) -> Self {
        Self {
            stream,
            path: path.into(),
        }
    }

    /// Returns the stream path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns every retained event, decoded, in stream order.
    ///
    /// # Errors
    ///
    /// Returns the stream error if the snapshot cannot be read.
    pub async fn transactions(&self) -> Result<Vec<TransactionEvent>, BridgeError> {
        Ok(self.stream.snapshot(&self.path).await?.decode())
    }

    /// Appends a raw device payload and returns it decoded with its key.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidRequest`] if `value` is not a JSON
    /// object, or the stream error if the append fails.
    pub async fn report_transaction(&self, value: serde_json::Value) -> Result<TransactionEvent, BridgeError> {
        if !value.is_object() {
            return Err(BridgeError::InvalidRequest(
                "transaction payload must be a JSON object".to_string(),
            ));
        }
        let key = self.stream.push(&self.path, value.clone()).await?;
        let event = TransactionEvent::decode(&key, &value);
        tracing::debug!(path = %self.path, %key, device_id = ?event.device_id, "transaction reported");
        Ok(event)
    }
}
