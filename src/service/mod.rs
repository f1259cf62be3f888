//! Service layer: orchestration over the stores.
//!
//! [`TransactionMirror`] projects the transaction stream onto device
//! records, [`DeviceService`] serves and updates those records, and
//! [`TransactionLog`] reads and appends raw stream entries.

pub mod device_service;
pub mod transaction_log;
pub mod transaction_mirror;

pub use device_service::{DeviceService, DeviceView};
pub use transaction_log::TransactionLog;
pub use transaction_mirror::{
    BatchReport, FeedCallback, FeedUpdate, MirrorOutcome, MirrorSettings, TransactionMirror,
    feed_publisher, select_latest,
};
