//! Device DTOs for list, detail, and update operations.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::PaginationMeta;
use super::transaction_dto::TransactionDto;
use crate::domain::DevicePatch;
use crate::service::DeviceView;

/// Device detail returned by every device endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DeviceDto {
    /// Device identifier.
    pub device_id: String,
    /// Owning account.
    pub owner_identifier: Option<String>,
    /// Last known network address.
    pub network_address: Option<String>,
    /// `"online"`, `"offline"` or `"unknown"`.
    pub status: String,
    /// Last activity, epoch milliseconds.
    pub last_seen: Option<i64>,
    /// Last activity as RFC 3339, or `"Never"`.
    pub last_seen_formatted: String,
    /// Last write, epoch milliseconds.
    pub updated_at: Option<i64>,
    /// Most recent mirrored transaction.
    pub latest_transaction: Option<TransactionDto>,
}

impl From<DeviceView> for DeviceDto {
    fn from(view: DeviceView) -> Self {
        let record = view.record;
        Self {
            device_id: record.device_id.into(),
            owner_identifier: record.owner_identifier,
            network_address: record.network_address,
            status: view.status.as_str().to_string(),
            last_seen: record.last_seen.map(|t| t.as_millis()),
            last_seen_formatted: view.last_seen_formatted,
            updated_at: record.updated_at.map(|t| t.as_millis()),
            latest_transaction: record.latest_transaction.map(TransactionDto::from),
        }
    }
}

/// Owner filter for `GET /devices`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OwnerQuery {
    /// Owning account, typically an email address.
    pub owner: String,
}

/// Paginated list response for `GET /devices`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceListResponse {
    /// Devices on this page.
    pub data: Vec<DeviceDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Request body for `PATCH /devices/{id}`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateDeviceRequest {
    /// New owner identifier.
    #[serde(default)]
    pub owner_identifier: Option<String>,
    /// New network address.
    #[serde(default)]
    pub network_address: Option<String>,
}

impl From<UpdateDeviceRequest> for DevicePatch {
    fn from(req: UpdateDeviceRequest) -> Self {
        Self {
            owner_identifier: non_blank(req.owner_identifier),
            network_address: non_blank(req.network_address),
            ..Self::default()
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Request body for `PUT /devices/{id}/network-address`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NetworkAddressRequest {
    /// Address the device is reachable at.
    pub network_address: String,
}

/// Request body for `POST /devices/{id}/heartbeat`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct HeartbeatRequest {
    /// Account the device is reporting for.
    pub owner_identifier: String,
}
