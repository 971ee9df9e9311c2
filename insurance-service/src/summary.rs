//! Flat views of a settled request for display

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::lifecycle::{LifecycleSnapshot, LifecycleState};
use crate::models::ERROR_DETAILS_FIELD;

/// Fields pulled out of a FHIR result bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub response_time: String,
}

impl ResultSummary {
    /// Summarise a result bundle.
    ///
    /// `policy_id` is the id the user submitted; bundles do not echo it back.
    pub fn from_bundle(bundle: &Value, policy_id: Option<&str>, elapsed: Duration) -> Self {
        let patient = find_resource(bundle, "Patient");
        let eligibility = find_resource(bundle, "CoverageEligibilityResponse");
        let claim = find_resource(bundle, "ClaimResponse");

        let mut summary = Self {
            gender: patient.and_then(|r| text_at(r, &["gender"])),
            response_time: format_seconds(elapsed),
            ..Default::default()
        };

        if let Some(resource) = eligibility {
            summary.name = text_at(resource, &["patient", "display"]);
            summary.status = text_at(resource, &["status"]);
            summary.policy_id = policy_id.map(str::to_string);
            summary.policy_start = text_at(resource, &["servicedPeriod", "start"]);
            summary.policy_end = text_at(resource, &["servicedPeriod", "end"]);
        }
        if let Some(resource) = claim {
            summary.name = text_at(resource, &["subject", "display"]);
            summary.policy_id = policy_id.map(str::to_string);
        }
        summary.error = bundle
            .get(ERROR_DETAILS_FIELD)
            .and_then(|details| text_at(details, &["message"]));

        summary
    }

    /// Summarise whatever the snapshot holds once it has settled
    pub fn from_snapshot(snapshot: &LifecycleSnapshot, policy_id: Option<&str>) -> Option<Self> {
        let elapsed = snapshot.context.time_taken_for_response;
        match snapshot.state {
            LifecycleState::Resolved => snapshot
                .context
                .hcx_response
                .as_ref()
                .map(|bundle| Self::from_bundle(bundle, policy_id, elapsed)),
            LifecycleState::Rejected => {
                let error = snapshot
                    .context
                    .error
                    .as_ref()
                    .and_then(error_message)
                    .or_else(|| Some(snapshot.context.message.clone()).filter(|m| !m.is_empty()));
                Some(Self {
                    error,
                    response_time: format_seconds(elapsed),
                    ..Default::default()
                })
            }
            _ => None,
        }
    }
}

fn find_resource<'a>(bundle: &'a Value, resource_type: &str) -> Option<&'a Value> {
    bundle
        .get("entry")?
        .as_array()?
        .iter()
        .filter_map(|entry| entry.get("resource"))
        .find(|resource| resource.get("resourceType").and_then(Value::as_str) == Some(resource_type))
}

fn text_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// `{"error": {"message": ..}}`, `{"message": ..}` or `{"error": ".."}`
fn error_message(document: &Value) -> Option<String> {
    text_at(document, &["error", "message"])
        .or_else(|| text_at(document, &["message"]))
        .or_else(|| text_at(document, &["error"]))
}

fn format_seconds(elapsed: Duration) -> String {
    format!("{} seconds", elapsed.as_secs_f64())
}
