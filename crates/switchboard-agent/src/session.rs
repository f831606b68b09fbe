use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use switchboard_core::config::{AppConfig, EvaluationMode};
use switchboard_core::error::{Result, SwitchboardError};
use switchboard_core::registry::AgentRegistry;
use switchboard_core::sanitize;
use switchboard_core::traits::Generator;
use switchboard_core::types::{
    SessionEvent, SessionRequest, SpecialistId, SESSION_ERROR_TEXT,
};
use switchboard_llm::GenerationAdapter;

use crate::dispatcher::{DispatchPolicy, Dispatcher};
use crate::evaluator::Evaluator;
use crate::narrator::Narrator;
use crate::router::Router;

/// Events buffered between the controller and a slow consumer.
const EVENT_BUFFER: usize = 16;

/// Whether and how often answers are judged and refined.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub evaluation: EvaluationMode,
    pub max_refine_passes: u32,
}

impl SessionPolicy {
    fn refine_budget(&self) -> u32 {
        match self.evaluation {
            EvaluationMode::Skip => 0,
            EvaluationMode::Refine => self.max_refine_passes,
        }
    }
}

/// Session state machine. `Evaluating` is only entered while refine budget remains.
enum Phase {
    Routing,
    Direct,
    Delegating(SpecialistId),
    Dispatching {
        specialist: SpecialistId,
        prompt: String,
        refines_left: u32,
    },
    Evaluating {
        specialist: SpecialistId,
        answer: String,
        refines_left: u32,
    },
    Refining {
        specialist: SpecialistId,
        guidance: String,
        refines_left: u32,
    },
    Concluding(SpecialistId),
    Done,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Routing => "routing",
            Phase::Direct => "direct",
            Phase::Delegating(_) => "delegating",
            Phase::Dispatching { .. } => "dispatching",
            Phase::Evaluating { .. } => "evaluating",
            Phase::Refining { .. } => "refining",
            Phase::Concluding(_) => "concluding",
            Phase::Done => "done",
        }
    }
}

/// Drives one request from routing to stream closure.
///
/// Stateless between sessions; share one instance behind an `Arc`.
pub struct SessionController {
    registry: Arc<AgentRegistry>,
    router: Router,
    dispatcher: Dispatcher,
    evaluator: Evaluator,
    narrator: Narrator,
    policy: SessionPolicy,
}

impl SessionController {
    pub fn new(
        registry: Arc<AgentRegistry>,
        router: Router,
        dispatcher: Dispatcher,
        evaluator: Evaluator,
        narrator: Narrator,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            registry,
            router,
            dispatcher,
            evaluator,
            narrator,
            policy,
        }
    }

    /// Wire every component from config around one shared generator.
    pub fn from_config(config: &AppConfig, generator: Arc<dyn Generator>) -> Self {
        let registry = Arc::new(AgentRegistry::from_config(&config.specialists));
        let adapter = GenerationAdapter::new(generator, config.generation.timeout());

        let router = Router::new(
            adapter.clone(),
            registry.clone(),
            Duration::from_secs(config.router.timeout_secs),
        );
        let dispatcher = Dispatcher::new(
            registry.clone(),
            adapter.clone(),
            DispatchPolicy::from(&config.dispatch),
        );
        let evaluator = Evaluator::new(
            adapter.clone(),
            config.session.evaluation_truncate_chars,
            config.generation.timeout(),
        );
        let narrator = Narrator::new(adapter, registry.clone());

        Self::new(
            registry,
            router,
            dispatcher,
            evaluator,
            narrator,
            SessionPolicy {
                evaluation: config.session.evaluation,
                max_refine_passes: config.session.max_refine_passes,
            },
        )
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Run a session on its own task and hand back the event receiver.
    ///
    /// The stream closes when the session reaches `Done`. Cancelling the
    /// token stops the session and drops any in-flight call.
    pub fn start(
        self: Arc<Self>,
        request: SessionRequest,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(async move {
            self.run(request, tx, cancel).await;
        });
        rx
    }

    /// Run a session to completion and return every event in order.
    pub async fn collect(&self, request: SessionRequest) -> Vec<SessionEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let (_, events) = tokio::join!(
            self.run(request, tx, cancel),
            ReceiverStream::new(rx).collect::<Vec<_>>()
        );
        events
    }

    /// Run a session, emitting into `events`. Unexpected faults (including
    /// panics) produce exactly one `Error` event.
    pub async fn run(
        &self,
        request: SessionRequest,
        events: mpsc::Sender<SessionEvent>,
        cancel: CancellationToken,
    ) {
        info!(session = %request.id, "Session started");

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                info!(session = %request.id, "Session cancelled");
                return;
            }
            outcome = AssertUnwindSafe(self.drive(&request, &events)).catch_unwind() => outcome,
        };

        let fault = match outcome {
            Ok(Ok(())) => {
                info!(session = %request.id, "Session complete");
                return;
            }
            Ok(Err(SwitchboardError::Cancelled)) => {
                info!(session = %request.id, "Caller disconnected");
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "session task panicked".to_string(),
        };

        error!(session = %request.id, error = %fault, "Session failed");
        let _ = events
            .send(SessionEvent::Error {
                text: SESSION_ERROR_TEXT.to_string(),
            })
            .await;
    }

    async fn drive(&self, request: &SessionRequest, events: &mpsc::Sender<SessionEvent>) -> Result<()> {
        let mut phase = Phase::Routing;

        loop {
            debug!(session = %request.id, phase = phase.name(), "Session phase");

            phase = match phase {
                Phase::Routing => match self.router.decide(&request.text).await {
                    SpecialistId::Orchestrator => Phase::Direct,
                    specialist => Phase::Delegating(specialist),
                },

                Phase::Direct => {
                    let reply = self
                        .dispatcher
                        .dispatch(SpecialistId::Orchestrator, &request.text)
                        .await?;
                    emit(events, SessionEvent::Direct {
                        text: sanitize(&reply.text),
                    })
                    .await?;
                    Phase::Done
                }

                Phase::Delegating(specialist) => {
                    let intro = self.narrator.intro(specialist, &request.text).await;
                    emit(events, SessionEvent::Intro { text: intro }).await?;
                    Phase::Dispatching {
                        specialist,
                        prompt: request.text.clone(),
                        refines_left: self.policy.refine_budget(),
                    }
                }

                Phase::Dispatching {
                    specialist,
                    prompt,
                    refines_left,
                } => {
                    let reply = self.dispatcher.dispatch(specialist, &prompt).await?;
                    let answer = sanitize(&reply.text);
                    emit(events, SessionEvent::SpecialistAnswer {
                        specialist,
                        text: answer.clone(),
                    })
                    .await?;

                    if refines_left == 0 {
                        Phase::Concluding(specialist)
                    } else if !reply.is_ok() {
                        // An apology is not worth judging or re-asking for.
                        debug!(specialist = %specialist, outcome = %reply.outcome, "Skipping evaluation of failed dispatch");
                        Phase::Concluding(specialist)
                    } else {
                        Phase::Evaluating {
                            specialist,
                            answer,
                            refines_left,
                        }
                    }
                }

                Phase::Evaluating {
                    specialist,
                    answer,
                    refines_left,
                } => {
                    let evaluation = self
                        .evaluator
                        .evaluate(&request.text, self.registry.specialty(specialist), &answer)
                        .await;
                    if evaluation.satisfactory {
                        Phase::Concluding(specialist)
                    } else {
                        Phase::Refining {
                            specialist,
                            guidance: evaluation.guidance,
                            refines_left,
                        }
                    }
                }

                Phase::Refining {
                    specialist,
                    guidance,
                    refines_left,
                } => {
                    info!(session = %request.id, specialist = %specialist, "Refining answer");
                    let notice = self.narrator.retry_notice(specialist).await;
                    emit(events, SessionEvent::Refining { text: notice }).await?;
                    Phase::Dispatching {
                        specialist,
                        prompt: refine_prompt(&request.text, &guidance),
                        refines_left: refines_left - 1,
                    }
                }

                Phase::Concluding(specialist) => {
                    let followup = self.narrator.followup(specialist, &request.text).await;
                    emit(events, SessionEvent::Followup { text: followup }).await?;
                    Phase::Done
                }

                Phase::Done => return Ok(()),
            };
        }
    }
}

/// The original request with the judge's guidance appended.
pub fn refine_prompt(request_text: &str, guidance: &str) -> String {
    format!("{}\n\nAdditional guidance: {}", request_text, guidance)
}

async fn emit(events: &mpsc::Sender<SessionEvent>, event: SessionEvent) -> Result<()> {
    debug!(kind = event.kind(), "Emitting session event");
    events
        .send(event)
        .await
        .map_err(|_| SwitchboardError::Cancelled)
}
