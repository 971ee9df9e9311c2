//! Result callbacks from the downstream groups
//!
//! The final eligibility or claim result arrives here and is pushed to every
//! connected notification client as an `acknowledgement` frame.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use insurance_service::{ChannelFrame, CorrelationId, RequestType, CORRELATION_HEADER};
use serde_json::{json, Value};
use tracing::info;

use crate::{error::ApiError, handlers::correlation_header, server::PortalServer};

/// `POST /v1/coverageeligibility/on_check`
pub async fn on_check(
    State(server): State<PortalServer>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    publish_result(&server, RequestType::Eligibility, &headers, body)
}

/// `POST /v1/claim/on_submit`
pub async fn on_submit(
    State(server): State<PortalServer>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    publish_result(&server, RequestType::Claim, &headers, body)
}

fn publish_result(
    server: &PortalServer,
    request_type: RequestType,
    headers: &HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(document) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let correlation_id = correlation_header(headers)
        .or_else(|| {
            document
                .get(CORRELATION_HEADER)
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .map(|raw| {
            raw.parse::<CorrelationId>()
                .map_err(|_| ApiError::bad_request(format!("invalid {CORRELATION_HEADER}: {raw}")))
        })
        .transpose()?;

    logger_redacted::payload_debug!(&document, %request_type, "Result callback received");
    let delivered = server
        .hub
        .publish(ChannelFrame::acknowledgement(correlation_id, document));

    info!(
        %request_type,
        correlation_id = ?correlation_id.map(|id| id.to_string()),
        delivered,
        "Result pushed to notification clients"
    );

    Ok((StatusCode::ACCEPTED, Json(json!({ "delivered": delivered }))))
}
