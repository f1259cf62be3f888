//! device-bridge server entry point.
//!
//! Loads configuration, wires the stores and services, starts the
//! transaction mirror, and serves the REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use device_bridge::api;
use device_bridge::app_state::AppState;
use device_bridge::config::{BridgeConfig, LogFormat, StoreBackend};
use device_bridge::store::{
    DocumentStore, InMemoryDocumentStore, InMemoryStream, PostgresDocumentStore, RealtimeStream,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BridgeConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    tracing::info!(
        addr = %config.listen_addr,
        backend = ?config.store_backend,
        stream_path = %config.stream_path,
        retain_limit = config.stream_retain_limit,
        "starting device-bridge"
    );

    let documents: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Memory => Arc::new(InMemoryDocumentStore::new()),
        StoreBackend::Postgres => Arc::new(
            PostgresDocumentStore::connect(&config)
                .await
                .context("connecting to the document store")?,
        ),
    };
    let stream: Arc<dyn RealtimeStream> = Arc::new(InMemoryStream::from_config(&config));

    let (app_state, tasks) = AppState::start(&config, documents, stream);
    let app = api::build_app(
        app_state,
        Duration::from_secs(config.request_timeout_secs),
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tasks.shutdown();
    tracing::info!("device-bridge stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
