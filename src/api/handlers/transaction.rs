//! Transaction stream handlers: read the retained events, append a new one.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{ReportTransactionRequest, TransactionDto, TransactionListResponse};
use crate::app_state::AppState;
use crate::error::{BridgeError, ErrorResponse};

/// `GET /transactions` — Read every retained stream event.
///
/// # Errors
///
/// Returns [`BridgeError`] if the stream cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    tag = "Transactions",
    summary = "List transactions",
    description = "Returns every event currently retained on the transaction stream, decoded, in stream order.",
    responses(
        (status = 200, description = "Stream contents", body = TransactionListResponse),
        (status = 503, description = "Stream unavailable", body = ErrorResponse),
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, BridgeError> {
    let transactions = state.transaction_log.transactions().await?;
    Ok(Json(TransactionListResponse {
        path: state.transaction_log.path().to_string(),
        count: transactions.len(),
        data: transactions.into_iter().map(TransactionDto::from).collect(),
    }))
}

/// `POST /transactions` — Append a device payload to the stream.
///
/// The payload is stored as sent. The mirror picks it up through the stream
/// subscription like any device-originated event.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidRequest`] if the body is not a JSON object.
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    tag = "Transactions",
    summary = "Report a transaction",
    description = "Appends a raw device transaction payload to the stream and returns it decoded with its stream key.",
    request_body = ReportTransactionRequest,
    responses(
        (status = 201, description = "Event appended", body = TransactionDto),
        (status = 400, description = "Body is not a JSON object", body = ErrorResponse),
    )
)]
pub async fn report_transaction(
    State(state): State<AppState>,
    Json(req): Json<ReportTransactionRequest>,
) -> Result<impl IntoResponse, BridgeError> {
    let event = state.transaction_log.report_transaction(req.0).await?;
    Ok((StatusCode::CREATED, Json(TransactionDto::from(event))))
}

/// Transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/transactions",
        get(list_transactions).post(report_transaction),
    )
}
