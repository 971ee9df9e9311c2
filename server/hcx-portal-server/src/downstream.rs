//! Downstream handler groups
//!
//! Each URL prefix (`/v1/coverageeligibility`, `/v1/claim`) is served by one
//! group. Requests are handed over verbatim: the sub-path under the prefix,
//! the JSON body and the correlation header; the group's status code and
//! JSON body come back unchanged.

use async_trait::async_trait;
use axum::http::StatusCode;
use insurance_service::CORRELATION_HEADER;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::ApiError;

/// Request handed to a downstream group
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardRequest {
    /// Path below the group prefix, with a leading `/`
    pub path: String,
    pub body: Value,
    pub correlation_id: Option<String>,
}

/// Answer of a downstream group
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[async_trait]
pub trait DownstreamGroup: Send + Sync {
    /// Group name used in logs and errors
    fn name(&self) -> &str;

    async fn forward(&self, request: ForwardRequest) -> Result<ForwardResponse, ApiError>;
}

/// Group served by an HTTP upstream
#[derive(Debug, Clone)]
pub struct HttpDownstream {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpDownstream {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let name = name.into();
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::Configuration {
                message: format!("no upstream URL configured for {name}"),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Configuration {
                message: e.to_string(),
            })?;

        Ok(Self {
            name,
            base_url,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl DownstreamGroup for HttpDownstream {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(group = %self.name, path = %request.path))]
    async fn forward(&self, request: ForwardRequest) -> Result<ForwardResponse, ApiError> {
        let mut outbound = self.client.post(self.url_for(&request.path)).json(&request.body);
        if let Some(correlation_id) = &request.correlation_id {
            outbound = outbound.header(CORRELATION_HEADER, correlation_id);
        }

        let response = outbound
            .send()
            .await
            .map_err(|e| ApiError::from_downstream(&self.name, &e))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| ApiError::internal(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_downstream(&self.name, &e))?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| ApiError::InvalidDownstreamBody {
                group: self.name.clone(),
                message: e.to_string(),
            })?
        };

        debug!(status = status.as_u16(), "Downstream answered");
        Ok(ForwardResponse { status, body })
    }
}
