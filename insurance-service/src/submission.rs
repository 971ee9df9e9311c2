use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{InsuranceError, InsuranceResult};
use crate::models::{
    CorrelationId, RequestPayload, RequestType, SubmissionError, SubmissionReceipt,
    CORRELATION_HEADER,
};

/// Performs the HTTP call made while a request is `loading`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn submit(
        &self,
        request_type: RequestType,
        payload: &RequestPayload,
        correlation_id: CorrelationId,
    ) -> Result<SubmissionReceipt, SubmissionError>;
}

/// Settings for [`HcxApiClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of the portal server, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Upper bound for the acknowledgement round trip
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// reqwest-backed client for the eligibility and claim endpoints
#[derive(Debug, Clone)]
pub struct HcxApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl HcxApiClient {
    pub fn new(config: ClientConfig) -> InsuranceResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(InsuranceError::Config("base url must not be empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn endpoint(&self, request_type: RequestType) -> String {
        format!("{}{}", self.base_url, request_type.endpoint_path())
    }
}

#[async_trait]
impl SubmissionService for HcxApiClient {
    #[instrument(skip_all, fields(%request_type, %correlation_id))]
    async fn submit(
        &self,
        request_type: RequestType,
        payload: &RequestPayload,
        correlation_id: CorrelationId,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let url = self.endpoint(request_type);
        debug!(%url, "Posting request");

        let response = self
            .http
            .post(&url)
            .header(CORRELATION_HEADER, correlation_id.to_string())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Submission transport failure");
                SubmissionError::transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubmissionError::transport(e.to_string()))?;

        if !status.is_success() {
            let document = serde_json::from_str::<Value>(&body).unwrap_or_else(|_| {
                serde_json::json!({ "error": { "message": body } })
            });
            warn!(status = status.as_u16(), "Submission returned an error response");
            return Err(SubmissionError::from_response(status.as_u16(), document));
        }

        Ok(receipt_from_body(body))
    }
}

/// Any 2xx counts as acknowledged, whatever the body looks like
fn receipt_from_body(body: String) -> SubmissionReceipt {
    if body.trim().is_empty() {
        return SubmissionReceipt::default();
    }
    match serde_json::from_str::<Value>(&body) {
        Ok(document @ Value::Object(_)) => {
            serde_json::from_value(document.clone()).unwrap_or_else(|_| SubmissionReceipt {
                acknowledgement: Some(document),
                ..Default::default()
            })
        }
        Ok(document) => SubmissionReceipt {
            acknowledgement: Some(document),
            ..Default::default()
        },
        Err(_) => {
            debug!("Acknowledgement body is not JSON");
            SubmissionReceipt {
                acknowledgement: Some(Value::String(body)),
                ..Default::default()
            }
        }
    }
}
