//! OpenAPI document for the REST surface.
//!
//! The JSON document is served at `/api-docs/openapi.json`. With the
//! `swagger-ui` feature the interactive UI is mounted at `/swagger-ui`.

use axum::Router;
use utoipa::OpenApi;

use crate::api::handlers::{device, system, transaction};
use crate::app_state::AppState;

/// Path the OpenAPI JSON is served at.
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// Generated OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "device-bridge",
        description = "Device liveness and transaction mirror for payment terminals."
    ),
    paths(
        system::health_handler,
        device::list_devices,
        device::get_device,
        device::update_device,
        device::update_network_address,
        device::heartbeat,
        transaction::list_transactions,
        transaction::report_transaction,
    ),
    tags(
        (name = "System", description = "Service health"),
        (name = "Devices", description = "Device records and liveness"),
        (name = "Transactions", description = "Raw transaction stream"),
    )
)]
pub struct ApiDoc;

/// Routes serving the OpenAPI document (and Swagger UI when enabled).
#[cfg(feature = "swagger-ui")]
pub fn routes() -> Router<AppState> {
    Router::new().merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url(OPENAPI_JSON_PATH, ApiDoc::openapi()),
    )
}

/// Routes serving the OpenAPI document (and Swagger UI when enabled).
#[cfg(not(feature = "swagger-ui"))]
pub fn routes() -> Router<AppState> {
    use axum::Json;
    use axum::routing::get;

    Router::new().route(
        OPENAPI_JSON_PATH,
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
