//! Request lifecycle state machine
//!
//! A single request moves `initial → loading → acknowledged → resolved`, or
//! ends in `rejected` when the submission fails or no result arrives in time.
//! Both end states accept `RETRY`, which discards the context and returns to
//! `initial`.
//!
//! The machine is a plain value. [`LifecycleMachine::send`] applies one event
//! and returns a [`Transition`] describing any side effect the caller has to
//! perform (issue the HTTP request, arm the acknowledgement timer). Side
//! effects are driven by [`crate::session::LifecycleSession`].

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::messages;
use crate::models::{
    CorrelationId, NotificationEvent, RequestPayload, RequestType, SubmissionError,
    SubmissionReceipt,
};

/// How long `acknowledged` waits for the final result
pub const DEFAULT_ACKNOWLEDGEMENT_TIMEOUT: Duration = Duration::from_secs(200);

/// Lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Initial,
    Loading,
    Acknowledged,
    Resolved,
    Rejected,
}

impl LifecycleState {
    /// End of the current request; only `RETRY` leaves these states
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Loading => "loading",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a `resolved` request actually ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// The result arrived but carries `x-hcx-error_details`
    DomainError,
}

/// Data accumulated for the live request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleContext {
    pub acknowledgement: Option<Value>,
    pub message: String,
    pub hcx_response: Option<Value>,
    pub error: Option<Value>,
    #[serde(serialize_with = "serialize_millis")]
    pub time_taken_for_response: Duration,
    pub request: Option<Value>,
    pub correlation_id: Option<CorrelationId>,
    pub outcome: Option<Outcome>,
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub(crate) submitted_instant: Option<Instant>,
}

impl LifecycleContext {
    fn elapsed(&self, now: Instant) -> Duration {
        self.submitted_instant
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Inputs the machine reacts to
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// User intent to send a request; only accepted in `initial`
    Submit {
        request_type: RequestType,
        payload: RequestPayload,
    },
    /// The HTTP call returned an acknowledgement
    SubmissionSucceeded(SubmissionReceipt),
    /// The HTTP call failed
    SubmissionFailed(SubmissionError),
    /// The final result arrived on the notification channel
    AcknowledgementSuccess(NotificationEvent),
    /// The acknowledgement timer for the given request expired
    AcknowledgementTimeout { correlation_id: CorrelationId },
    /// User intent to start over
    Retry,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "SUBMIT",
            Self::SubmissionSucceeded(_) => "SUBMISSION_SUCCEEDED",
            Self::SubmissionFailed(_) => "SUBMISSION_FAILED",
            Self::AcknowledgementSuccess(_) => "ACKNOWLEDGEMENT_SUCCESS",
            Self::AcknowledgementTimeout { .. } => "ACKNOWLEDGEMENT_TIMEOUT",
            Self::Retry => "RETRY",
        }
    }
}

/// Work the driver must perform after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// POST the payload to the endpoint selected by `request_type`
    IssueRequest {
        correlation_id: CorrelationId,
        request_type: RequestType,
        payload: RequestPayload,
    },
    /// Fire `AcknowledgementTimeout` at `deadline` unless the state changes first
    ArmTimeout {
        correlation_id: CorrelationId,
        deadline: Instant,
    },
}

/// Result of feeding one event to the machine
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Moved {
        from: LifecycleState,
        to: LifecycleState,
        effect: Option<Effect>,
    },
    /// The event is not accepted in the current state; nothing changed
    Ignored {
        state: LifecycleState,
        event: &'static str,
    },
}

impl Transition {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. })
    }

    /// State after the transition
    pub fn state(&self) -> LifecycleState {
        match self {
            Self::Moved { to, .. } => *to,
            Self::Ignored { state, .. } => *state,
        }
    }

    pub fn effect(&self) -> Option<&Effect> {
        match self {
            Self::Moved { effect, .. } => effect.as_ref(),
            Self::Ignored { .. } => None,
        }
    }
}

/// Observable copy of the machine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleSnapshot {
    pub state: LifecycleState,
    pub context: LifecycleContext,
}

impl Default for LifecycleSnapshot {
    fn default() -> Self {
        Self {
            state: LifecycleState::Initial,
            context: LifecycleContext::default(),
        }
    }
}

/// The eligibility/claim request state machine
#[derive(Debug, Clone)]
pub struct LifecycleMachine {
    state: LifecycleState,
    context: LifecycleContext,
    acknowledgement_timeout: Duration,
}

impl LifecycleMachine {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_ACKNOWLEDGEMENT_TIMEOUT)
    }

    pub fn with_timeout(acknowledgement_timeout: Duration) -> Self {
        Self {
            state: LifecycleState::Initial,
            context: LifecycleContext::default(),
            acknowledgement_timeout,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn context(&self) -> &LifecycleContext {
        &self.context
    }

    pub fn acknowledgement_timeout(&self) -> Duration {
        self.acknowledgement_timeout
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            state: self.state,
            context: self.context.clone(),
        }
    }

    /// Apply one event at time `now`
    pub fn send(&mut self, event: LifecycleEvent, now: Instant) -> Transition {
        let from = self.state;
        let name = event.name();

        let (to, effect) = match (from, event) {
            (LifecycleState::Initial, LifecycleEvent::Submit { request_type, payload }) => {
                let correlation_id = CorrelationId::new();
                self.context.message = messages::REQUEST_SUBMITTING.to_string();
                self.context.submitted_instant = Some(now);
                self.context.submitted_at = Some(Utc::now());
                self.context.correlation_id = Some(correlation_id);
                info!(%correlation_id, %request_type, "Submitting request");
                (
                    LifecycleState::Loading,
                    Some(Effect::IssueRequest {
                        correlation_id,
                        request_type,
                        payload,
                    }),
                )
            }

            (LifecycleState::Loading, LifecycleEvent::SubmissionSucceeded(receipt)) => {
                self.context.acknowledgement = receipt.acknowledgement;
                self.context.request = receipt.request;
                self.context.message = messages::REQUEST_SUBMITTED.to_string();
                let effect = self.context.correlation_id.map(|correlation_id| Effect::ArmTimeout {
                    correlation_id,
                    deadline: now + self.acknowledgement_timeout,
                });
                (LifecycleState::Acknowledged, effect)
            }

            (LifecycleState::Loading, LifecycleEvent::SubmissionFailed(failure)) => {
                warn!(
                    correlation_id = ?self.context.correlation_id,
                    status = ?failure.status,
                    "Submission rejected"
                );
                self.context.message = failure.message.unwrap_or_default();
                self.context.error = Some(failure.document);
                self.context.time_taken_for_response = self.context.elapsed(now);
                (LifecycleState::Rejected, None)
            }

            (LifecycleState::Acknowledged, LifecycleEvent::AcknowledgementSuccess(notification)) => {
                if !self.belongs_to_live_request(notification.correlation_id) {
                    debug!(
                        expected = ?self.context.correlation_id,
                        received = ?notification.correlation_id,
                        "Dropping result for another request"
                    );
                    return Transition::Ignored { state: from, event: name };
                }
                let outcome = if notification.has_error_details() {
                    self.context.message = messages::SOMETHING_WENT_WRONG.to_string();
                    Outcome::DomainError
                } else {
                    self.context.message = messages::ELIGIBLE_SUCCESS.to_string();
                    Outcome::Success
                };
                self.context.outcome = Some(outcome);
                self.context.hcx_response = Some(notification.payload);
                self.context.time_taken_for_response = self.context.elapsed(now);
                (LifecycleState::Resolved, None)
            }

            (LifecycleState::Acknowledged, LifecycleEvent::AcknowledgementTimeout { correlation_id })
                if self.context.correlation_id == Some(correlation_id) =>
            {
                warn!(%correlation_id, "No result before the acknowledgement timeout");
                self.context.acknowledgement = None;
                self.context.message = messages::ELIGIBLE_FAILURE.to_string();
                self.context.error = Some(json!({ "error": "Timeout" }));
                self.context.time_taken_for_response = self.context.elapsed(now);
                (LifecycleState::Rejected, None)
            }

            (LifecycleState::Resolved | LifecycleState::Rejected, LifecycleEvent::Retry) => {
                self.context = LifecycleContext::default();
                (LifecycleState::Initial, None)
            }

            (state, _) => {
                debug!(%state, event = name, "Event ignored");
                return Transition::Ignored { state, event: name };
            }
        };

        self.state = to;
        debug!(%from, %to, event = name, "Lifecycle transition");
        Transition::Moved { from, to, effect }
    }

    /// A result without a correlation id is attributed to the live request
    fn belongs_to_live_request(&self, correlation_id: Option<CorrelationId>) -> bool {
        match correlation_id {
            Some(received) => self.context.correlation_id == Some(received),
            None => true,
        }
    }
}

impl Default for LifecycleMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;
    use proptest::prelude::*;

    fn payload() -> RequestPayload {
        RequestPayload::new("PL-2041", "Ravi Kumar", Gender::Male)
    }

    fn submit(machine: &mut LifecycleMachine, now: Instant) -> CorrelationId {
        let transition = machine.send(
            LifecycleEvent::Submit {
                request_type: RequestType::Eligibility,
                payload: payload(),
            },
            now,
        );
        match transition.effect() {
            Some(Effect::IssueRequest { correlation_id, .. }) => *correlation_id,
            other => panic!("expected IssueRequest, got {other:?}"),
        }
    }

    fn acknowledge(machine: &mut LifecycleMachine, now: Instant) -> Transition {
        machine.send(
            LifecycleEvent::SubmissionSucceeded(SubmissionReceipt {
                acknowledgement: Some(json!({ "status": "queued" })),
                request: Some(json!({ "policyId": "PL-2041" })),
            }),
            now,
        )
    }

    #[test]
    fn submit_moves_to_loading_and_issues_request() {
        let mut machine = LifecycleMachine::new();
        let now = Instant::now();
        let transition = machine.send(
            LifecycleEvent::Submit {
                request_type: RequestType::Claim,
                payload: payload(),
            },
            now,
        );

        assert_eq!(machine.state(), LifecycleState::Loading);
        assert_eq!(machine.context().message, messages::REQUEST_SUBMITTING);
        assert!(machine.context().submitted_at.is_some());
        match transition.effect() {
            Some(Effect::IssueRequest { request_type, payload: sent, correlation_id }) => {
                assert_eq!(*request_type, RequestType::Claim);
                assert_eq!(sent, &payload());
                assert_eq!(machine.context().correlation_id, Some(*correlation_id));
            }
            other => panic!("unexpected effect {other:?}"),
        }
    }

    #[test]
    fn second_submit_is_ignored_until_retry() {
        let mut machine = LifecycleMachine::new();
        let now = Instant::now();
        let first = submit(&mut machine, now);

        let again = machine.send(
            LifecycleEvent::Submit {
                request_type: RequestType::Eligibility,
                payload: payload(),
            },
            now,
        );
        assert!(again.is_ignored());
        assert_eq!(machine.context().correlation_id, Some(first));
    }

    #[test]
    fn acknowledgement_stores_receipt_and_arms_timeout() {
        let mut machine = LifecycleMachine::new();
        let start = Instant::now();
        let correlation_id = submit(&mut machine, start);
        let acked_at = start + Duration::from_millis(350);
        let transition = acknowledge(&mut machine, acked_at);

        assert_eq!(machine.state(), LifecycleState::Acknowledged);
        assert_eq!(machine.context().acknowledgement, Some(json!({ "status": "queued" })));
        assert_eq!(machine.context().request, Some(json!({ "policyId": "PL-2041" })));
        assert_eq!(machine.context().message, messages::REQUEST_SUBMITTED);
        assert_eq!(
            transition.effect(),
            Some(&Effect::ArmTimeout {
                correlation_id,
                deadline: acked_at + DEFAULT_ACKNOWLEDGEMENT_TIMEOUT,
            })
        );
    }

    #[test]
    fn failed_submission_is_rejected_with_error_document() {
        let mut machine = LifecycleMachine::new();
        let start = Instant::now();
        submit(&mut machine, start);

        let document = json!({ "message": "Policy not found", "error": { "code": "ERR_POLICY" } });
        machine.send(
            LifecycleEvent::SubmissionFailed(SubmissionError::from_response(404, document.clone())),
            start + Duration::from_millis(120),
        );

        assert_eq!(machine.state(), LifecycleState::Rejected);
        assert_eq!(machine.context().message, "Policy not found");
        assert_eq!(machine.context().error, Some(document));
        assert_eq!(machine.context().time_taken_for_response, Duration::from_millis(120));
    }

    #[test]
    fn result_with_error_details_resolves_as_domain_error() {
        let mut machine = LifecycleMachine::new();
        let start = Instant::now();
        submit(&mut machine, start);
        acknowledge(&mut machine, start);

        let payload = json!({ "entry": [], "x-hcx-error_details": { "message": "bad" } });
        machine.send(
            LifecycleEvent::AcknowledgementSuccess(NotificationEvent::new(payload.clone())),
            start + Duration::from_secs(3),
        );

        assert_eq!(machine.state(), LifecycleState::Resolved);
        assert_eq!(machine.context().message, messages::SOMETHING_WENT_WRONG);
        assert_eq!(machine.context().outcome, Some(Outcome::DomainError));
        assert_eq!(machine.context().hcx_response, Some(payload));
        assert_eq!(machine.context().time_taken_for_response, Duration::from_secs(3));
    }

    #[test]
    fn clean_result_resolves_as_success() {
        let mut machine = LifecycleMachine::new();
        let start = Instant::now();
        let correlation_id = submit(&mut machine, start);
        acknowledge(&mut machine, start);

        machine.send(
            LifecycleEvent::AcknowledgementSuccess(NotificationEvent::correlated(
                correlation_id,
                json!({ "entry": [{ "resource": { "resourceType": "CoverageEligibilityResponse" } }] }),
            )),
            start,
        );

        assert_eq!(machine.state(), LifecycleState::Resolved);
        assert_eq!(machine.context().message, messages::ELIGIBLE_SUCCESS);
        assert_eq!(machine.context().outcome, Some(Outcome::Success));
    }

    #[test]
    fn result_for_another_request_is_ignored() {
        let mut machine = LifecycleMachine::new();
        let start = Instant::now();
        submit(&mut machine, start);
        acknowledge(&mut machine, start);

        let transition = machine.send(
            LifecycleEvent::AcknowledgementSuccess(NotificationEvent::correlated(
                CorrelationId::new(),
                json!({ "entry": [] }),
            )),
            start,
        );

        assert!(transition.is_ignored());
        assert_eq!(machine.state(), LifecycleState::Acknowledged);
        assert!(machine.context().hcx_response.is_none());
    }

    #[test]
    fn notifications_outside_acknowledged_are_ignored() {
        let mut machine = LifecycleMachine::new();
        let start = Instant::now();
        let result = || LifecycleEvent::AcknowledgementSuccess(NotificationEvent::new(json!({ "entry": [] })));

        assert!(machine.send(result(), start).is_ignored());

        submit(&mut machine, start);
        assert!(machine.send(result(), start).is_ignored());
        assert_eq!(machine.state(), LifecycleState::Loading);

        machine.send(
            LifecycleEvent::SubmissionFailed(SubmissionError::transport("connection refused")),
            start,
        );
        let before = machine.context().clone();
        assert!(machine.send(result(), start).is_ignored());
        assert_eq!(machine.context(), &before);
    }

    #[test]
    fn timeout_rejects_with_synthetic_error() {
        let mut machine = LifecycleMachine::new();
        let start = Instant::now();
        let correlation_id = submit(&mut machine, start);
        acknowledge(&mut machine, start);

        machine.send(
            LifecycleEvent::AcknowledgementTimeout { correlation_id },
            start + DEFAULT_ACKNOWLEDGEMENT_TIMEOUT,
        );

        assert_eq!(machine.state(), LifecycleState::Rejected);
        assert_eq!(machine.context().acknowledgement, None);
        assert_eq!(machine.context().message, messages::ELIGIBLE_FAILURE);
        assert_eq!(machine.context().error, Some(json!({ "error": "Timeout" })));
        assert_eq!(machine.context().time_taken_for_response, DEFAULT_ACKNOWLEDGEMENT_TIMEOUT);
    }

    #[test]
    fn stale_timeout_is_ignored() {
        let mut machine = LifecycleMachine::new();
        let start = Instant::now();
        submit(&mut machine, start);
        acknowledge(&mut machine, start);

        let transition = machine.send(
            LifecycleEvent::AcknowledgementTimeout {
                correlation_id: CorrelationId::new(),
            },
            start,
        );
        assert!(transition.is_ignored());
        assert_eq!(machine.state(), LifecycleState::Acknowledged);
    }

    #[test]
    fn retry_resets_context() {
        let mut machine = LifecycleMachine::new();
        let start = Instant::now();
        submit(&mut machine, start);
        machine.send(
            LifecycleEvent::SubmissionFailed(SubmissionError::transport("timed out")),
            start,
        );

        machine.send(LifecycleEvent::Retry, start);

        assert_eq!(machine.state(), LifecycleState::Initial);
        assert_eq!(machine.context(), &LifecycleContext::default());
    }

    #[test]
    fn retry_is_ignored_while_in_flight() {
        let mut machine = LifecycleMachine::new();
        let start = Instant::now();
        submit(&mut machine, start);
        assert!(machine.send(LifecycleEvent::Retry, start).is_ignored());
        acknowledge(&mut machine, start);
        assert!(machine.send(LifecycleEvent::Retry, start).is_ignored());
    }

    #[test]
    fn context_serializes_elapsed_as_millis() {
        let mut machine = LifecycleMachine::new();
        let start = Instant::now();
        submit(&mut machine, start);
        machine.send(
            LifecycleEvent::SubmissionFailed(SubmissionError::transport("reset")),
            start + Duration::from_millis(1500),
        );

        let value = serde_json::to_value(machine.snapshot()).unwrap();
        assert_eq!(value["state"], "rejected");
        assert_eq!(value["context"]["timeTakenForResponse"], 1500);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Submit,
        Succeed,
        Fail,
        Notify { error: bool, live: bool },
        Timeout { live: bool },
        Retry,
        Wait(u64),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::Submit),
            Just(Step::Succeed),
            Just(Step::Fail),
            (any::<bool>(), any::<bool>()).prop_map(|(error, live)| Step::Notify { error, live }),
            any::<bool>().prop_map(|live| Step::Timeout { live }),
            Just(Step::Retry),
            (0u64..5_000).prop_map(Step::Wait),
        ]
    }

    proptest! {
        #[test]
        fn transitions_follow_the_lifecycle(steps in proptest::collection::vec(step(), 1..40)) {
            let mut machine = LifecycleMachine::new();
            let mut now = Instant::now();

            for step in steps {
                let before = machine.state();
                let live = machine.context().correlation_id.unwrap_or_default();
                let event = match step {
                    Step::Submit => LifecycleEvent::Submit {
                        request_type: RequestType::Eligibility,
                        payload: payload(),
                    },
                    Step::Succeed => LifecycleEvent::SubmissionSucceeded(SubmissionReceipt::default()),
                    Step::Fail => LifecycleEvent::SubmissionFailed(SubmissionError::transport("down")),
                    Step::Notify { error, live: same } => {
                        let body = if error {
                            json!({ "x-hcx-error_details": { "message": "bad" } })
                        } else {
                            json!({ "entry": [] })
                        };
                        let id = if same { live } else { CorrelationId::new() };
                        LifecycleEvent::AcknowledgementSuccess(NotificationEvent::correlated(id, body))
                    }
                    Step::Timeout { live: same } => LifecycleEvent::AcknowledgementTimeout {
                        correlation_id: if same { live } else { CorrelationId::new() },
                    },
                    Step::Retry => LifecycleEvent::Retry,
                    Step::Wait(ms) => {
                        now += Duration::from_millis(ms);
                        continue;
                    }
                };
                let is_submit = matches!(event, LifecycleEvent::Submit { .. });
                let is_notify = matches!(event, LifecycleEvent::AcknowledgementSuccess(_));
                let context_before = machine.context().clone();

                let transition = machine.send(event, now);

                if is_submit {
                    prop_assert_eq!(!transition.is_ignored(), before == LifecycleState::Initial);
                }
                if is_notify && before != LifecycleState::Acknowledged {
                    prop_assert!(transition.is_ignored());
                }
                if transition.is_ignored() {
                    prop_assert_eq!(machine.state(), before);
                    prop_assert_eq!(machine.context(), &context_before);
                }
                if let Transition::Moved { from, to, .. } = transition {
                    let allowed = matches!(
                        (from, to),
                        (LifecycleState::Initial, LifecycleState::Loading)
                            | (LifecycleState::Loading, LifecycleState::Acknowledged)
                            | (LifecycleState::Loading, LifecycleState::Rejected)
                            | (LifecycleState::Acknowledged, LifecycleState::Resolved)
                            | (LifecycleState::Acknowledged, LifecycleState::Rejected)
                            | (LifecycleState::Resolved, LifecycleState::Initial)
                            | (LifecycleState::Rejected, LifecycleState::Initial)
                    );
                    prop_assert!(allowed, "unexpected transition {} -> {}", from, to);
                }
                if machine.state() == LifecycleState::Initial {
                    prop_assert_eq!(machine.context(), &LifecycleContext::default());
                }
            }
        }
    }
}
