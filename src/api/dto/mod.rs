//! Data Transfer Objects for REST request/response serialization.
//!
//! Timestamps are serialized as epoch milliseconds; device status is a
//! lowercase string.

pub mod common_dto;
pub mod device_dto;
pub mod transaction_dto;

pub use common_dto::*;
pub use device_dto::*;
pub use transaction_dto::*;
