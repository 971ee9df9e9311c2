use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Errors surfaced by the portal API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Downstream {group} unavailable: {message}")]
    DownstreamUnavailable { group: String, message: String },

    #[error("Downstream {group} timed out")]
    DownstreamTimeout { group: String },

    #[error("Downstream {group} returned an invalid body: {message}")]
    InvalidDownstreamBody { group: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

/// Error details nested under `error` in the response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorDetails {
    pub error_id: String,
    pub error_type: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error body: `{"message": ..., "error": {...}}`, the shape the submission
/// client reads on a non-2xx answer
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub message: String,
    pub error: ApiErrorDetails,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::DownstreamUnavailable { .. } | ApiError::InvalidDownstreamBody { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::DownstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Configuration { .. } | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "bad_request",
            ApiError::DownstreamUnavailable { .. } => "downstream_unavailable",
            ApiError::DownstreamTimeout { .. } => "downstream_timeout",
            ApiError::InvalidDownstreamBody { .. } => "invalid_downstream_body",
            ApiError::Configuration { .. } => "configuration_error",
            ApiError::Internal { .. } => "internal_error",
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
        }
    }

    /// Classify a reqwest failure against a downstream group
    pub fn from_downstream(group: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::DownstreamTimeout {
                group: group.to_string(),
            }
        } else if err.is_decode() {
            ApiError::InvalidDownstreamBody {
                group: group.to_string(),
                message: err.to_string(),
            }
        } else {
            ApiError::DownstreamUnavailable {
                group: group.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        error!(
            error_id = %error_id,
            error_type = %self.error_type(),
            status_code = %status_code.as_u16(),
            error = %self,
            "API error occurred"
        );

        let body = ApiErrorResponse {
            message: self.to_string(),
            error: ApiErrorDetails {
                error_id,
                error_type: self.error_type().to_string(),
                timestamp: chrono::Utc::now(),
            },
        };

        (status_code, Json(body)).into_response()
    }
}
