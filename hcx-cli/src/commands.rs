use anyhow::{Context, Result};
use insurance_service::{
    ClientConfig, HcxApiClient, InsuranceError, InsuranceResult, LifecycleSession, LifecycleSnapshot,
    LifecycleState, NotificationChannel, RequestPayload, RequestType, ResultSummary, Scenario,
    SessionConfig, SubmissionService, WebSocketChannel,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cli::{Cli, Command, RequestArgs};

pub async fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let request_type = cli.command.request_type();
    match (cli.command, request_type) {
        (Command::Check(args) | Command::Claim(args), Some(request_type)) => {
            let payload = build_payload(&args)?;
            let client = HcxApiClient::new(ClientConfig {
                base_url: cli.base_url,
                request_timeout: Duration::from_secs(args.request_timeout),
            })?;
            let channel = WebSocketChannel::connect(&cli.ws_url)
                .await
                .with_context(|| format!("Failed to connect to {}", cli.ws_url))?;

            let config = SessionConfig {
                acknowledgement_timeout: Duration::from_secs(args.timeout),
                ..Default::default()
            };
            let settled =
                follow_request(Arc::new(client), channel, request_type, payload, config, out).await?;
            writeln!(out, "{}", render_report(&settled, &args)?)?;
            Ok(())
        }
        _ => list_scenarios(out),
    }
}

/// Print the bundled scenarios, marking the default selection
pub fn list_scenarios(out: &mut impl Write) -> Result<()> {
    for scenario in Scenario::catalog()? {
        let marker = if scenario.selected { "*" } else { " " };
        writeln!(out, "{marker} {:>2}  {}", scenario.index, scenario.label)?;
    }
    Ok(())
}

/// Assemble the request body from the arguments and the chosen scenario
pub fn build_payload(args: &RequestArgs) -> InsuranceResult<RequestPayload> {
    let scenario = match args.scenario {
        Some(index) => Some(Scenario::find(index)?),
        None => Scenario::default_selection()?,
    };

    let mut payload = RequestPayload::new(args.policy_id.as_str(), args.name.as_str(), args.gender);
    if let Some(scenario) = &scenario {
        payload = payload.with_scenario(scenario);
    }
    payload.validate()?;
    Ok(payload)
}

/// Submit one request and print every state change until it settles
pub async fn follow_request<C>(
    service: Arc<dyn SubmissionService>,
    channel: C,
    request_type: RequestType,
    payload: RequestPayload,
    config: SessionConfig,
    out: &mut impl Write,
) -> Result<LifecycleSnapshot>
where
    C: NotificationChannel + 'static,
{
    let session = LifecycleSession::spawn(service, channel, config);
    let mut updates = session.subscribe();
    updates.borrow_and_update();

    let correlation_id = session.submit(request_type, payload).await?;
    debug!(%correlation_id, %request_type, "Request submitted");
    writeln!(out, "{request_type} request {correlation_id}")?;

    let settled = loop {
        let snapshot = updates.borrow_and_update().clone();
        if snapshot.state != LifecycleState::Initial {
            writeln!(out, "[{}] {}", snapshot.state, snapshot.context.message)?;
        }
        if snapshot.state.is_terminal() {
            break snapshot;
        }
        updates
            .changed()
            .await
            .map_err(|_| InsuranceError::SessionClosed)?;
    };

    session.close().await?;
    Ok(settled)
}

/// Result summary as pretty JSON, or the whole snapshot with `--raw`
pub fn render_report(snapshot: &LifecycleSnapshot, args: &RequestArgs) -> Result<String> {
    if args.raw {
        return Ok(serde_json::to_string_pretty(snapshot)?);
    }
    match ResultSummary::from_snapshot(snapshot, Some(&args.policy_id)) {
        Some(summary) => Ok(serde_json::to_string_pretty(&summary)?),
        None => Ok(serde_json::to_string_pretty(snapshot)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use insurance_service::{
        in_memory_channel, messages, CorrelationId, Gender, NotificationEvent, Outcome,
        SubmissionError, SubmissionReceipt,
    };
    use serde_json::json;

    struct AcceptingService;

    #[async_trait]
    impl SubmissionService for AcceptingService {
        async fn submit(
            &self,
            _request_type: RequestType,
            _payload: &RequestPayload,
            _correlation_id: CorrelationId,
        ) -> Result<SubmissionReceipt, SubmissionError> {
            Ok(SubmissionReceipt {
                acknowledgement: Some(json!({ "status": "ACCEPTED" })),
                request: Some(json!({ "resourceType": "CoverageEligibilityRequest" })),
            })
        }
    }

    fn request_args(scenario: Option<u32>) -> RequestArgs {
        RequestArgs {
            policy_id: "PL-3003".to_string(),
            name: "Meera Nair".to_string(),
            gender: Gender::Female,
            scenario,
            timeout: 200,
            request_timeout: 30,
            raw: false,
        }
    }

    #[test]
    fn payload_uses_selected_scenario_by_default() {
        let payload = build_payload(&request_args(None)).unwrap();
        let value = payload.to_value().unwrap();
        assert_eq!(value["policyId"], "PL-3003");
        assert_eq!(value["gender"], "Female");
    }

    #[test]
    fn payload_merges_requested_scenario() {
        let payload = build_payload(&request_args(Some(2))).unwrap();
        let value = payload.to_value().unwrap();
        assert_eq!(value["scenarioCode"], "POLICY_EXPIRED");
        assert_eq!(value["name"], "Meera Nair");
    }

    #[test]
    fn unknown_scenario_is_an_error() {
        let err = build_payload(&request_args(Some(99))).unwrap_err();
        assert!(matches!(err, InsuranceError::UnknownScenario(99)));
    }

    #[test]
    fn scenario_listing_marks_default() {
        let mut out = Vec::new();
        list_scenarios(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().any(|line| line.starts_with('*')));
        assert_eq!(text.lines().count(), Scenario::catalog().unwrap().len());
    }

    #[tokio::test(start_paused = true)]
    async fn follows_request_to_resolution() {
        let (publisher, channel) = in_memory_channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            publisher
                .publish(NotificationEvent::new(json!({ "resourceType": "Bundle", "entry": [] })))
                .unwrap();
            // Keep the channel open until the session closes it
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let mut out = Vec::new();
        let settled = follow_request(
            Arc::new(AcceptingService),
            channel,
            RequestType::Eligibility,
            build_payload(&request_args(None)).unwrap(),
            SessionConfig::default(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(settled.state, LifecycleState::Resolved);
        assert_eq!(settled.context.outcome, Some(Outcome::Success));

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[resolved]"));
        assert!(text.contains(messages::ELIGIBLE_SUCCESS));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_payer_times_out() {
        let (_publisher, channel) = in_memory_channel();

        let mut out = Vec::new();
        let settled = follow_request(
            Arc::new(AcceptingService),
            channel,
            RequestType::Claim,
            build_payload(&request_args(None)).unwrap(),
            SessionConfig {
                acknowledgement_timeout: Duration::from_secs(5),
                ..Default::default()
            },
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(settled.state, LifecycleState::Rejected);
        assert_eq!(settled.context.error, Some(json!({ "error": "Timeout" })));

        let report = render_report(&settled, &request_args(None)).unwrap();
        assert!(report.contains("responseTime"));
    }
}
