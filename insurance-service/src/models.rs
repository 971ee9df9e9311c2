use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::{InsuranceError, InsuranceResult};
use crate::scenarios::Scenario;

/// Top-level field a result document carries when downstream processing failed
pub const ERROR_DETAILS_FIELD: &str = "x-hcx-error_details";

/// Header (and callback body field) carrying the correlation id
pub const CORRELATION_HEADER: &str = "x-hcx-correlation_id";

/// Name of the channel event that delivers the final result document
pub const ACKNOWLEDGEMENT_EVENT: &str = "acknowledgement";

/// Kind of request a submission performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestType {
    Eligibility,
    Claim,
}

impl RequestType {
    /// Path of the endpoint this request type is posted to
    pub fn endpoint_path(self) -> &'static str {
        match self {
            RequestType::Eligibility => "/v1/coverageeligibility/check",
            RequestType::Claim => "/v1/claim/submit",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestType::Eligibility => write!(f, "ELIGIBILITY"),
            RequestType::Claim => write!(f, "CLAIM"),
        }
    }
}

/// Patient gender as captured on the request form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl std::str::FromStr for Gender {
    type Err = InsuranceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(InsuranceError::Validation(format!(
                "gender must be Male or Female, got '{other}'"
            ))),
        }
    }
}

/// Body of an eligibility or claim submission.
///
/// Scenario-specific fields are flattened into the same JSON object, so the
/// wire shape is `{"policyId": .., "name": .., "gender": .., ...extra}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    pub policy_id: String,
    pub name: String,
    pub gender: Gender,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestPayload {
    pub fn new(policy_id: impl Into<String>, name: impl Into<String>, gender: Gender) -> Self {
        Self {
            policy_id: policy_id.into(),
            name: name.into(),
            gender,
            extra: Map::new(),
        }
    }

    /// Merge a scenario's canned body into the payload.
    ///
    /// The scenario is applied last, so its `policyId`, `name` and `gender`
    /// replace the form values. A scenario gender that is not Male or Female
    /// leaves the form gender in place.
    pub fn with_scenario(mut self, scenario: &Scenario) -> Self {
        for (key, value) in &scenario.body {
            match (key.as_str(), value.as_str()) {
                ("policyId", Some(policy_id)) => self.policy_id = policy_id.to_string(),
                ("name", Some(name)) => self.name = name.to_string(),
                ("gender", Some(gender)) => {
                    if let Ok(gender) = gender.parse() {
                        self.gender = gender;
                    }
                }
                ("policyId" | "name" | "gender", None) => {}
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
        self
    }

    /// Reject payloads the form would not have let through
    pub fn validate(&self) -> InsuranceResult<()> {
        if self.policy_id.trim().is_empty() {
            return Err(InsuranceError::Validation("policy id is required".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(InsuranceError::Validation("name is required".to_string()));
        }
        Ok(())
    }

    pub fn to_value(&self) -> InsuranceResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Identifier tying a submission to its asynchronous result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Success body of the submission endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    #[serde(default)]
    pub acknowledgement: Option<Value>,
    #[serde(default)]
    pub request: Option<Value>,
}

/// Failure of the submission call, either transport-level or an error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionError {
    /// `message` field of the error response, if any
    pub message: Option<String>,
    /// Full error document as returned by the backend
    pub document: Value,
    /// HTTP status, absent for transport failures
    pub status: Option<u16>,
}

impl SubmissionError {
    /// Build from an error response body
    pub fn from_response(status: u16, document: Value) -> Self {
        let message = document
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            message,
            document,
            status: Some(status),
        }
    }

    /// Build for a failure where no response body exists
    pub fn transport(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            document: serde_json::json!({ "error": { "message": message } }),
            message: Some(message),
            status: None,
        }
    }
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.status, &self.message) {
            (Some(status), Some(message)) => write!(f, "{status}: {message}"),
            (Some(status), None) => write!(f, "{status}"),
            (None, Some(message)) => write!(f, "{message}"),
            (None, None) => write!(f, "submission failed"),
        }
    }
}

/// Final result pushed over the notification channel
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub correlation_id: Option<CorrelationId>,
    pub payload: Value,
}

impl NotificationEvent {
    pub fn new(payload: Value) -> Self {
        Self {
            correlation_id: None,
            payload,
        }
    }

    pub fn correlated(correlation_id: CorrelationId, payload: Value) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            payload,
        }
    }

    /// Whether the result signals a downstream failure
    pub fn has_error_details(&self) -> bool {
        has_error_details(&self.payload)
    }
}

pub fn has_error_details(document: &Value) -> bool {
    document
        .as_object()
        .is_some_and(|fields| fields.contains_key(ERROR_DETAILS_FIELD))
}

/// JSON text frame exchanged on the notification channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFrame {
    pub event: String,
    #[serde(default, rename = "correlationId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    #[serde(default)]
    pub data: Value,
}

impl ChannelFrame {
    pub fn acknowledgement(correlation_id: Option<CorrelationId>, data: Value) -> Self {
        Self {
            event: ACKNOWLEDGEMENT_EVENT.to_string(),
            correlation_id,
            data,
        }
    }

    /// Convert into a notification if this frame carries a result
    pub fn into_notification(self) -> Option<NotificationEvent> {
        (self.event == ACKNOWLEDGEMENT_EVENT).then(|| NotificationEvent {
            correlation_id: self.correlation_id,
            payload: self.data,
        })
    }
}
