//! Device handlers: list by owner, get, update, network address, heartbeat.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::dto::{
    DeviceDto, DeviceListResponse, HeartbeatRequest, NetworkAddressRequest, OwnerQuery,
    PaginationParams, UpdateDeviceRequest,
};
use crate::app_state::AppState;
use crate::domain::DeviceId;
use crate::error::{BridgeError, ErrorResponse};

/// `GET /devices?owner=` — List devices owned by an account.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidRequest`] for a blank owner.
#[utoipa::path(
    get,
    path = "/api/v1/devices",
    tag = "Devices",
    summary = "List devices by owner",
    description = "Returns a paginated list of the devices registered to an owner, each with its computed online status.",
    params(OwnerQuery, PaginationParams),
    responses(
        (status = 200, description = "Paginated device list", body = DeviceListResponse),
        (status = 400, description = "Missing or blank owner", body = ErrorResponse),
    )
)]
pub async fn list_devices(
    State(state): State<AppState>,
    Query(owner): Query<OwnerQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, BridgeError> {
    let mut views = state.device_service.user_devices(&owner.owner).await?;
    views.sort_by(|a, b| a.record.device_id.cmp(&b.record.device_id));

    let (page, pagination) = params.paginate(views);
    Ok(Json(DeviceListResponse {
        data: page.into_iter().map(DeviceDto::from).collect(),
        pagination,
    }))
}

/// `GET /devices/{id}` — Get one device with its status.
///
/// # Errors
///
/// Returns [`BridgeError::DeviceNotFound`] if the device does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/devices/{id}",
    tag = "Devices",
    summary = "Get device",
    description = "Returns the device record, its online status, and its latest mirrored transaction.",
    params(
        ("id" = String, Path, description = "Device identifier"),
    ),
    responses(
        (status = 200, description = "Device details", body = DeviceDto),
        (status = 404, description = "Device not found", body = ErrorResponse),
    )
)]
pub async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BridgeError> {
    let device_id = DeviceId::parse(&id)?;
    let view = state.device_service.device(&device_id).await?;
    Ok(Json(DeviceDto::from(view)))
}

/// `PATCH /devices/{id}` — Create or merge a device record.
///
/// # Errors
///
/// Returns [`BridgeError`] if the id is blank or the store write fails.
#[utoipa::path(
    patch,
    path = "/api/v1/devices/{id}",
    tag = "Devices",
    summary = "Update device",
    description = "Merges the given fields into the device record, creating it if needed. Also marks the device as seen now.",
    params(
        ("id" = String, Path, description = "Device identifier"),
    ),
    request_body = UpdateDeviceRequest,
    responses(
        (status = 200, description = "Device after the update", body = DeviceDto),
        (status = 400, description = "Invalid device id", body = ErrorResponse),
        (status = 503, description = "Document store unavailable", body = ErrorResponse),
    )
)]
pub async fn update_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDeviceRequest>,
) -> Result<impl IntoResponse, BridgeError> {
    let device_id = DeviceId::parse(&id)?;
    let view = state
        .device_service
        .update_device(&device_id, req.into())
        .await?;
    Ok(Json(DeviceDto::from(view)))
}

/// `PUT /devices/{id}/network-address` — Record where a device is reachable.
///
/// # Errors
///
/// Returns [`BridgeError::DeviceNotFound`] if the device does not exist.
#[utoipa::path(
    put,
    path = "/api/v1/devices/{id}/network-address",
    tag = "Devices",
    summary = "Set network address",
    description = "Stores the network address of an existing device.",
    params(
        ("id" = String, Path, description = "Device identifier"),
    ),
    request_body = NetworkAddressRequest,
    responses(
        (status = 200, description = "Device after the update", body = DeviceDto),
        (status = 400, description = "Blank address", body = ErrorResponse),
        (status = 404, description = "Device not found", body = ErrorResponse),
    )
)]
pub async fn update_network_address(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NetworkAddressRequest>,
) -> Result<impl IntoResponse, BridgeError> {
    let device_id = DeviceId::parse(&id)?;
    let view = state
        .device_service
        .update_network_address(&device_id, &req.network_address)
        .await?;
    Ok(Json(DeviceDto::from(view)))
}

/// `POST /devices/{id}/heartbeat` — Mark a device as active.
///
/// # Errors
///
/// Returns [`BridgeError::DeviceNotFound`] if the device does not exist.
#[utoipa::path(
    post,
    path = "/api/v1/devices/{id}/heartbeat",
    tag = "Devices",
    summary = "Device heartbeat",
    description = "Refreshes last_seen of an existing device and records the reporting owner.",
    params(
        ("id" = String, Path, description = "Device identifier"),
    ),
    request_body = HeartbeatRequest,
    responses(
        (status = 200, description = "Device after the heartbeat", body = DeviceDto),
        (status = 404, description = "Device not found", body = ErrorResponse),
    )
)]
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<impl IntoResponse, BridgeError> {
    let device_id = DeviceId::parse(&id)?;
    let view = state
        .device_service
        .touch_from_realtime(&device_id, &req.owner_identifier)
        .await?;
    Ok(Json(DeviceDto::from(view)))
}

/// Device routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices))
        .route("/devices/{id}", get(get_device).patch(update_device))
        .route("/devices/{id}/network-address", put(update_network_address))
        .route("/devices/{id}/heartbeat", post(heartbeat))
}
