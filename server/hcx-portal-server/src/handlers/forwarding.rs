use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::{
    downstream::{DownstreamGroup, ForwardRequest},
    error::ApiError,
    handlers::correlation_header,
    server::PortalServer,
};

/// `POST /v1/coverageeligibility/*`
pub async fn forward_coverage_eligibility(
    State(server): State<PortalServer>,
    Path(rest): Path<String>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    forward(server.coverage_eligibility.as_ref(), &rest, &headers, body).await
}

/// `POST /v1/claim/*`
pub async fn forward_claim(
    State(server): State<PortalServer>,
    Path(rest): Path<String>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    forward(server.claim.as_ref(), &rest, &headers, body).await
}

async fn forward(
    group: &dyn DownstreamGroup,
    rest: &str,
    headers: &HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let request = ForwardRequest {
        path: format!("/{}", rest.trim_start_matches('/')),
        body,
        correlation_id: correlation_header(headers),
    };

    logger_redacted::payload_debug!(&request.body, group = group.name(), "Forwarding request");
    let path = request.path.clone();
    let response = group.forward(request).await?;
    info!(
        group = group.name(),
        path = %path,
        status = response.status.as_u16(),
        "Request forwarded"
    );

    if response.body.is_null() {
        Ok(response.status.into_response())
    } else {
        Ok((response.status, Json(response.body)).into_response())
    }
}
