pub mod callbacks;
pub mod forwarding;
pub mod health;
pub mod websocket;

use axum::http::HeaderMap;
use insurance_service::CORRELATION_HEADER;

/// Correlation id sent by the caller, if any
pub(crate) fn correlation_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
