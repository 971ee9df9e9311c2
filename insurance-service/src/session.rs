//! Async driver for [`LifecycleMachine`]
//!
//! One task owns the machine, the notification channel and the acknowledgement
//! deadline. User intents, HTTP completions, channel events and timer expiry
//! are all funnelled into that task and applied one at a time. Observers read
//! state through a `watch` channel of [`LifecycleSnapshot`]s.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{InsuranceError, InsuranceResult};
use crate::lifecycle::{
    Effect, LifecycleEvent, LifecycleMachine, LifecycleSnapshot, LifecycleState, Transition,
    DEFAULT_ACKNOWLEDGEMENT_TIMEOUT,
};
use crate::models::{CorrelationId, RequestPayload, RequestType, SubmissionError, SubmissionReceipt};
use crate::notification::NotificationChannel;
use crate::submission::SubmissionService;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub acknowledgement_timeout: Duration,
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            acknowledgement_timeout: DEFAULT_ACKNOWLEDGEMENT_TIMEOUT,
            command_buffer: 16,
        }
    }
}

enum SessionCommand {
    Submit {
        request_type: RequestType,
        payload: RequestPayload,
        reply: oneshot::Sender<InsuranceResult<CorrelationId>>,
    },
    Retry {
        reply: oneshot::Sender<InsuranceResult<()>>,
    },
    Close {
        reply: oneshot::Sender<InsuranceResult<()>>,
    },
}

type Completion = (CorrelationId, Result<SubmissionReceipt, SubmissionError>);

/// Handle to a running request lifecycle
pub struct LifecycleSession {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<LifecycleSnapshot>,
    task: JoinHandle<()>,
}

impl LifecycleSession {
    /// Start the session task. The channel is owned by the session from here on.
    pub fn spawn<C>(service: Arc<dyn SubmissionService>, channel: C, config: SessionConfig) -> Self
    where
        C: NotificationChannel + 'static,
    {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer.max(1));
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let machine = LifecycleMachine::with_timeout(config.acknowledgement_timeout);
        let (snapshots_tx, snapshots_rx) = watch::channel(machine.snapshot());

        let actor = SessionActor {
            machine,
            service,
            channel,
            channel_open: true,
            commands: commands_rx,
            completions_tx,
            completions_rx,
            deadline: None,
            snapshots: snapshots_tx,
        };
        let task = tokio::spawn(actor.run());

        Self {
            commands: commands_tx,
            snapshots: snapshots_rx,
            task,
        }
    }

    /// Send a request. Fails if the payload is invalid or a request is already live.
    pub async fn submit(
        &self,
        request_type: RequestType,
        payload: RequestPayload,
    ) -> InsuranceResult<CorrelationId> {
        payload.validate()?;
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Submit {
            request_type,
            payload,
            reply,
        })
        .await?;
        response.await.map_err(|_| InsuranceError::SessionClosed)?
    }

    /// Discard the finished request and return to `initial`
    pub async fn retry(&self) -> InsuranceResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Retry { reply }).await?;
        response.await.map_err(|_| InsuranceError::SessionClosed)?
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleSnapshot> {
        self.snapshots.clone()
    }

    pub async fn wait_for_state(&self, state: LifecycleState) -> InsuranceResult<LifecycleSnapshot> {
        self.wait_for(|snapshot| snapshot.state == state).await
    }

    /// Wait until the live request reaches `resolved` or `rejected`
    pub async fn wait_until_settled(&self) -> InsuranceResult<LifecycleSnapshot> {
        self.wait_for(|snapshot| snapshot.state.is_terminal()).await
    }

    async fn wait_for(
        &self,
        predicate: impl FnMut(&LifecycleSnapshot) -> bool,
    ) -> InsuranceResult<LifecycleSnapshot> {
        let mut snapshots = self.subscribe();
        let snapshot = snapshots
            .wait_for(predicate)
            .await
            .map_err(|_| InsuranceError::SessionClosed)?;
        Ok(snapshot.clone())
    }

    /// Close the notification channel and stop the session task
    pub async fn close(self) -> InsuranceResult<()> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(SessionCommand::Close { reply }).await.is_err() {
            return Ok(());
        }
        let result = response.await.unwrap_or(Ok(()));
        if let Err(e) = self.task.await {
            error!(error = %e, "Session task failed");
        }
        result
    }

    async fn send(&self, command: SessionCommand) -> InsuranceResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| InsuranceError::SessionClosed)
    }
}

struct SessionActor<C> {
    machine: LifecycleMachine,
    service: Arc<dyn SubmissionService>,
    channel: C,
    channel_open: bool,
    commands: mpsc::Receiver<SessionCommand>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    deadline: Option<(CorrelationId, Instant)>,
    snapshots: watch::Sender<LifecycleSnapshot>,
}

impl<C: NotificationChannel> SessionActor<C> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        if let Err(e) = self.channel.close().await {
                            warn!(error = %e, "Failed to close notification channel");
                        }
                        break;
                    }
                },
                Some((correlation_id, result)) = self.completions_rx.recv() => {
                    self.handle_completion(correlation_id, result);
                }
                event = self.channel.next_event(), if self.channel_open => match event {
                    Some(Ok(event)) => {
                        self.apply(LifecycleEvent::AcknowledgementSuccess(event));
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Notification channel failed");
                        self.channel_open = false;
                    }
                    None => {
                        warn!("Notification channel closed; results can no longer be received");
                        self.channel_open = false;
                    }
                },
                () = expire(self.deadline.map(|(_, at)| at)) => {
                    if let Some((correlation_id, _)) = self.deadline.take() {
                        self.apply(LifecycleEvent::AcknowledgementTimeout { correlation_id });
                    }
                }
            }
        }
        debug!("Session task stopped");
    }

    async fn handle_command(&mut self, command: SessionCommand) -> ControlFlow<()> {
        match command {
            SessionCommand::Submit {
                request_type,
                payload,
                reply,
            } => {
                let state = self.machine.state();
                if state != LifecycleState::Initial {
                    let _ = reply.send(Err(InsuranceError::RequestInFlight { state }));
                    return ControlFlow::Continue(());
                }
                if let Ok(value) = payload.to_value() {
                    logger_redacted::payload_debug!(&value, %request_type, "Submit payload");
                }
                let transition = self.apply(LifecycleEvent::Submit {
                    request_type,
                    payload,
                });
                let result = match transition.effect() {
                    Some(Effect::IssueRequest { correlation_id, .. }) => Ok(*correlation_id),
                    _ => Err(InsuranceError::RequestInFlight {
                        state: transition.state(),
                    }),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Retry { reply } => {
                let state = self.machine.state();
                let result = if state.is_terminal() {
                    self.apply(LifecycleEvent::Retry);
                    Ok(())
                } else {
                    Err(InsuranceError::NotFinished { state })
                };
                let _ = reply.send(result);
            }
            SessionCommand::Close { reply } => {
                let _ = reply.send(self.channel.close().await);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_completion(
        &mut self,
        correlation_id: CorrelationId,
        result: Result<SubmissionReceipt, SubmissionError>,
    ) {
        if self.machine.context().correlation_id != Some(correlation_id) {
            debug!(%correlation_id, "Dropping completion for a discarded request");
            return;
        }
        let event = match result {
            Ok(receipt) => LifecycleEvent::SubmissionSucceeded(receipt),
            Err(failure) => LifecycleEvent::SubmissionFailed(failure),
        };
        self.apply(event);
    }

    fn apply(&mut self, event: LifecycleEvent) -> Transition {
        let transition = self.machine.send(event, Instant::now());
        let Transition::Moved { from, to, effect } = &transition else {
            return transition;
        };

        // Any move invalidates the previous deadline
        self.deadline = None;
        match effect {
            Some(Effect::IssueRequest {
                correlation_id,
                request_type,
                payload,
            }) => self.issue_request(*correlation_id, *request_type, payload.clone()),
            Some(Effect::ArmTimeout {
                correlation_id,
                deadline,
            }) => self.deadline = Some((*correlation_id, *deadline)),
            None => {}
        }

        info!(
            %from,
            %to,
            correlation_id = ?self.machine.context().correlation_id,
            message = %self.machine.context().message,
            "Request state changed"
        );
        self.snapshots.send_replace(self.machine.snapshot());
        transition
    }

    fn issue_request(
        &self,
        correlation_id: CorrelationId,
        request_type: RequestType,
        payload: RequestPayload,
    ) {
        let service = Arc::clone(&self.service);
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = service.submit(request_type, &payload, correlation_id).await;
            let _ = completions.send((correlation_id, result));
        });
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
