//! Domain layer: identifiers, timestamps, records, liveness, and events.
//!
//! Everything in here is pure data and pure functions. Store access lives
//! in [`crate::store`], orchestration in [`crate::service`].

pub mod bridge_event;
pub mod device_id;
pub mod device_record;
pub mod event_bus;
pub mod liveness;
pub mod timestamp;
pub mod transaction;

pub use bridge_event::BridgeEvent;
pub use device_id::DeviceId;
pub use device_record::{DevicePatch, DeviceRecord};
pub use event_bus::EventBus;
pub use liveness::{DeviceStatus, device_status, format_last_seen, is_online, is_online_at};
pub use timestamp::Timestamp;
pub use transaction::{TransactionEvent, TransactionKind};
