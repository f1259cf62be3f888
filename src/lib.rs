//! # device-bridge
//!
//! Liveness tracking and transaction mirroring for IoT payment terminals.
//!
//! Devices append transaction events to a realtime stream. The bridge
//! copies the newest event of every stream notification into the
//! reporting device's document, keeps the device's `last_seen` fresh, and
//! answers "is this device online?" with a fixed 60 second window. Device
//! records and stream notifications are exposed over REST and WebSocket.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── DeviceService, TransactionLog (service/)
//!     ├── EventBus, liveness (domain/)
//!     │
//!     ├── TransactionMirror ◄── RealtimeStream (store/)
//!     │         │
//!     │         ▼
//!     └── DocumentStore: in-memory or PostgreSQL (store/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;
pub mod ws;
