//! Shared harness: runs the full application on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use device_bridge::api;
use device_bridge::app_state::{AppState, BackgroundTasks};
use device_bridge::config::BridgeConfig;
use device_bridge::store::{DocumentStore, InMemoryDocumentStore, InMemoryStream, RealtimeStream};

/// A running bridge backed by in-memory stores.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    _tasks: BackgroundTasks,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

#[allow(clippy::panic)]
pub async fn spawn_app() -> TestApp {
    let config = BridgeConfig::default();
    let documents: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
    let stream: Arc<dyn RealtimeStream> = Arc::new(InMemoryStream::from_config(&config));
    let (state, tasks) = AppState::start(&config, documents, stream);
    let app = api::build_app(state, Duration::from_secs(5));

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind ephemeral port");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestApp {
        addr,
        client: reqwest::Client::new(),
        _tasks: tasks,
    }
}
