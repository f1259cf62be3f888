//! Shared application state injected into all Axum handlers, and the
//! wiring that starts the bridge's background tasks.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::BridgeConfig;
use crate::domain::EventBus;
use crate::service::{
    DeviceService, MirrorSettings, TransactionLog, TransactionMirror, feed_publisher,
};
use crate::store::{DocumentStore, RealtimeStream};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Device record operations.
    pub device_service: Arc<DeviceService>,
    /// Raw transaction stream access.
    pub transaction_log: Arc<TransactionLog>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

/// Handles of the tasks started by [`AppState::start`].
#[derive(Debug)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Aborts every task.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

impl AppState {
    /// Builds the services over the given stores and starts the
    /// transaction mirror and the device change forwarder.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(
        config: &BridgeConfig,
        documents: Arc<dyn DocumentStore>,
        stream: Arc<dyn RealtimeStream>,
    ) -> (Self, BackgroundTasks) {
        let event_bus = EventBus::new(config.event_bus_capacity);

        let device_service = Arc::new(DeviceService::new(
            Arc::clone(&documents),
            event_bus.clone(),
        ));
        let transaction_log = Arc::new(TransactionLog::new(
            Arc::clone(&stream),
            config.stream_path.clone(),
        ));

        let mirror = Arc::new(TransactionMirror::new(
            documents,
            MirrorSettings::from_config(config),
            feed_publisher(event_bus.clone()),
        ));

        let handles = vec![
            device_service.spawn_change_forwarder(),
            mirror.spawn(stream, config.stream_path.clone()),
        ];

        let state = Self {
            device_service,
            transaction_log,
            event_bus,
        };
        (state, BackgroundTasks { handles })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::DEFAULT_STREAM_RETAIN_LIMIT;
    use crate::store::{InMemoryDocumentStore, InMemoryStream};

    #[tokio::test]
    async fn default_wiring_bounds_the_transaction_stream() {
        let config = BridgeConfig::default();
        let documents = Arc::new(InMemoryDocumentStore::new());
        let stream = Arc::new(InMemoryStream::from_config(&config));
        let (state, tasks) = AppState::start(
            &config,
            documents as Arc<dyn DocumentStore>,
            stream as Arc<dyn RealtimeStream>,
        );

        let total = DEFAULT_STREAM_RETAIN_LIMIT + 25;
        for amount in 0..total {
            let reported = state
                .transaction_log
                .report_transaction(json!({ "deviceId": "ESP32_001", "amount": amount }))
                .await;
            assert!(reported.is_ok());
        }

        let Ok(retained) = state.transaction_log.transactions().await else {
            panic!("stream read failed");
        };
        assert_eq!(retained.len(), DEFAULT_STREAM_RETAIN_LIMIT);
        assert_eq!(retained.first().and_then(|t| t.amount), Some(25.0));
        assert_eq!(
            retained.last().and_then(|t| t.amount),
            Some((total - 1) as f64)
        );

        tasks.shutdown();
    }
}
