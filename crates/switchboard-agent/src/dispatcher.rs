use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use switchboard_core::config::DispatchConfig;
use switchboard_core::error::Result;
use switchboard_core::registry::AgentRegistry;
use switchboard_core::types::{ReplyOutcome, SpecialistId, SpecialistReply};
use switchboard_llm::GenerationAdapter;

/// Bounded-retry contract for specialist calls.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub request_timeout: Duration,
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    pub retry_client_errors: bool,
}

impl DispatchPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    fn should_retry(&self, outcome: ReplyOutcome) -> bool {
        outcome.is_transient()
            || (self.retry_client_errors && matches!(outcome, ReplyOutcome::BadStatus(_)))
    }
}

impl From<&DispatchConfig> for DispatchPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            retry_client_errors: config.retry_client_errors,
        }
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

#[derive(Serialize)]
struct ProcessRequest<'a> {
    question: &'a str,
}

#[derive(Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    answer: Option<String>,
}

/// Sends requests to specialists, or to the generation capability for the orchestrator.
pub struct Dispatcher {
    http: Client,
    registry: Arc<AgentRegistry>,
    adapter: GenerationAdapter,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(registry: Arc<AgentRegistry>, adapter: GenerationAdapter, policy: DispatchPolicy) -> Self {
        Self {
            http: Client::new(),
            registry,
            adapter,
            policy,
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Errors only when the registry has no endpoint for a remote specialist.
    pub async fn dispatch(&self, id: SpecialistId, request_text: &str) -> Result<SpecialistReply> {
        if !id.is_remote() {
            let text = self.adapter.complete_default(request_text).await;
            return Ok(SpecialistReply::ok(text, 0));
        }

        let url = format!("{}/process", self.registry.endpoint(id)?);
        let max_attempts = self.policy.max_attempts();

        for attempt in 1..=max_attempts {
            info!(specialist = %id, attempt, max_attempts, "Querying specialist");

            match self.attempt(&url, request_text).await {
                Ok(answer) => {
                    info!(
                        specialist = %id,
                        attempt,
                        chars = answer.chars().count(),
                        "Specialist answered"
                    );
                    return Ok(SpecialistReply::ok(answer, attempt));
                }
                Err(outcome) => {
                    warn!(specialist = %id, attempt, outcome = %outcome, "Specialist attempt failed");

                    if !self.policy.should_retry(outcome) {
                        return Ok(SpecialistReply {
                            text: rejection_text(id, outcome),
                            outcome,
                            attempts: attempt,
                        });
                    }
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        warn!(specialist = %id, attempts = max_attempts, "Specialist retries exhausted");
        Ok(SpecialistReply {
            text: exhausted_text(id),
            outcome: ReplyOutcome::Exhausted,
            attempts: max_attempts,
        })
    }

    /// One POST; the error side is the failure class.
    async fn attempt(&self, url: &str, question: &str) -> std::result::Result<String, ReplyOutcome> {
        let response = self
            .http
            .post(url)
            .timeout(self.policy.request_timeout)
            .json(&ProcessRequest { question })
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ReplyOutcome::BadStatus(status.as_u16()));
        }

        let body: ProcessResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                ReplyOutcome::InvalidBody
            } else {
                classify_transport_error(&e)
            }
        })?;
        Ok(body.answer.unwrap_or_default())
    }
}

fn classify_transport_error(e: &reqwest::Error) -> ReplyOutcome {
    if e.is_timeout() {
        ReplyOutcome::Timeout
    } else {
        ReplyOutcome::ConnectionFailed
    }
}

/// Apology shown when every attempt failed.
pub fn exhausted_text(id: SpecialistId) -> String {
    format!(
        "Sorry, I couldn't get a response from the {} expert at this time.",
        id.key()
    )
}

fn rejection_text(id: SpecialistId, outcome: ReplyOutcome) -> String {
    format!(
        "Sorry, the {} expert could not handle this request ({}).",
        id.key(),
        outcome
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use switchboard_core::config::SpecialistsConfig;
    use switchboard_test_utils::{unreachable_endpoint, MockResponse, MockSpecialist, StaticGenerator};

    fn fast_policy(max_retries: u32) -> DispatchPolicy {
        DispatchPolicy {
            request_timeout: Duration::from_millis(200),
            max_retries,
            retry_delay: Duration::from_millis(20),
            retry_client_errors: false,
        }
    }

    fn dispatcher_for(endpoint: &str, policy: DispatchPolicy) -> (Dispatcher, Arc<StaticGenerator>) {
        let mut specialists = SpecialistsConfig::default();
        specialists.math.endpoint = Some(endpoint.to_string());
        let gen = Arc::new(StaticGenerator::new("direct answer"));
        let adapter = GenerationAdapter::new(gen.clone(), Duration::from_secs(15));
        (
            Dispatcher::new(Arc::new(AgentRegistry::from_config(&specialists)), adapter, policy),
            gen,
        )
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let mock = MockSpecialist::spawn(vec![MockResponse::Answer("4".into())]).await;
        let (dispatcher, _) = dispatcher_for(&mock.base_url, fast_policy(3));

        let reply = dispatcher.dispatch(SpecialistId::Math, "What is 2+2?").await.unwrap();
        assert_eq!(reply.outcome, ReplyOutcome::Ok);
        assert_eq!(reply.text, "4");
        assert_eq!(reply.attempts, 1);
        assert_eq!(mock.hits(), 1);
        assert_eq!(mock.questions(), vec!["What is 2+2?".to_string()]);
    }

    #[tokio::test]
    async fn test_always_timing_out_exhausts_all_attempts() {
        let mock = MockSpecialist::spawn(vec![MockResponse::Hang]).await;
        let (dispatcher, _) = dispatcher_for(&mock.base_url, fast_policy(3));

        let reply = dispatcher.dispatch(SpecialistId::Math, "slow").await.unwrap();
        assert_eq!(reply.outcome, ReplyOutcome::Exhausted);
        assert_eq!(reply.attempts, 4);
        assert_eq!(mock.hits(), 4);
        assert_eq!(reply.text, exhausted_text(SpecialistId::Math));
        assert!(reply.text.contains("agent_math"));
    }

    #[tokio::test]
    async fn test_recovers_on_third_attempt_after_sleeping() {
        let mock = MockSpecialist::spawn(vec![
            MockResponse::Status(503),
            MockResponse::Status(502),
            MockResponse::Answer("finally".into()),
        ])
        .await;
        let policy = fast_policy(3);
        let delay = policy.retry_delay;
        let (dispatcher, _) = dispatcher_for(&mock.base_url, policy);

        let started = Instant::now();
        let reply = dispatcher.dispatch(SpecialistId::Math, "q").await.unwrap();
        assert_eq!(reply.outcome, ReplyOutcome::Ok);
        assert_eq!(reply.text, "finally");
        assert_eq!(reply.attempts, 3);
        assert_eq!(mock.hits(), 3);
        assert!(started.elapsed() >= delay * 2);
    }

    #[tokio::test]
    async fn test_client_error_surfaces_immediately() {
        let mock = MockSpecialist::spawn(vec![MockResponse::Status(400)]).await;
        let (dispatcher, _) = dispatcher_for(&mock.base_url, fast_policy(3));

        let reply = dispatcher.dispatch(SpecialistId::Math, "bad").await.unwrap();
        assert_eq!(reply.outcome, ReplyOutcome::BadStatus(400));
        assert_eq!(reply.attempts, 1);
        assert_eq!(mock.hits(), 1);
    }

    #[tokio::test]
    async fn test_legacy_mode_retries_client_errors() {
        let mock = MockSpecialist::spawn(vec![MockResponse::Status(400)]).await;
        let policy = DispatchPolicy {
            retry_client_errors: true,
            ..fast_policy(2)
        };
        let (dispatcher, _) = dispatcher_for(&mock.base_url, policy);

        let reply = dispatcher.dispatch(SpecialistId::Math, "bad").await.unwrap();
        assert_eq!(reply.outcome, ReplyOutcome::Exhausted);
        assert_eq!(mock.hits(), 3);
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried() {
        let endpoint = unreachable_endpoint().await;
        let (dispatcher, _) = dispatcher_for(&endpoint, fast_policy(1));

        let reply = dispatcher.dispatch(SpecialistId::Math, "q").await.unwrap();
        assert_eq!(reply.outcome, ReplyOutcome::Exhausted);
        assert_eq!(reply.attempts, 2);
    }

    #[tokio::test]
    async fn test_garbage_body_is_retried() {
        let mock = MockSpecialist::spawn(vec![
            MockResponse::Garbage,
            MockResponse::Answer("clean".into()),
        ])
        .await;
        let (dispatcher, _) = dispatcher_for(&mock.base_url, fast_policy(3));

        let reply = dispatcher.dispatch(SpecialistId::Math, "q").await.unwrap();
        assert_eq!(reply.text, "clean");
        assert_eq!(reply.attempts, 2);
    }

    #[tokio::test]
    async fn test_missing_answer_field_is_empty_ok() {
        let mock = MockSpecialist::spawn(vec![MockResponse::NoAnswerField]).await;
        let (dispatcher, _) = dispatcher_for(&mock.base_url, fast_policy(3));

        let reply = dispatcher.dispatch(SpecialistId::Math, "q").await.unwrap();
        assert_eq!(reply.outcome, ReplyOutcome::Ok);
        assert_eq!(reply.text, "");
        assert_eq!(mock.hits(), 1);
    }

    #[tokio::test]
    async fn test_orchestrator_goes_to_generator() {
        let mock = MockSpecialist::spawn(vec![MockResponse::Answer("unused".into())]).await;
        let (dispatcher, gen) = dispatcher_for(&mock.base_url, fast_policy(3));

        let reply = dispatcher
            .dispatch(SpecialistId::Orchestrator, "hello there")
            .await
            .unwrap();
        assert_eq!(reply.outcome, ReplyOutcome::Ok);
        assert_eq!(reply.text, "direct answer");
        assert_eq!(reply.attempts, 0);
        assert_eq!(gen.call_count(), 1);
        assert_eq!(mock.hits(), 0);
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_error() {
        let mut specialists = SpecialistsConfig::default();
        specialists.coding.endpoint = None;
        let adapter = GenerationAdapter::new(
            Arc::new(StaticGenerator::new("x")),
            Duration::from_secs(15),
        );
        let dispatcher = Dispatcher::new(
            Arc::new(AgentRegistry::from_config(&specialists)),
            adapter,
            fast_policy(0),
        );
        assert!(dispatcher.dispatch(SpecialistId::Coding, "q").await.is_err());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = DispatchPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.request_timeout, Duration::from_secs(60));
        assert_eq!(policy.retry_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_max_attempts_saturates() {
        let policy = DispatchPolicy {
            max_retries: u32::MAX,
            ..DispatchPolicy::default()
        };
        assert_eq!(policy.max_attempts(), u32::MAX);
    }
}
