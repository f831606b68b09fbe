//! Mocks and fixtures shared by the Switchboard crates' tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::future::BoxFuture;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use switchboard_core::error::{Result, SwitchboardError};
use switchboard_core::traits::Generator;

// ── Generators ──────────────────────────────────────────────────

/// What a scripted generator does for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
    /// Never completes; exercises the adapter timeout.
    Hang,
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

struct Rule {
    needle: String,
    replies: Vec<Reply>,
    cursor: AtomicUsize,
}

impl Rule {
    fn next(&self) -> Reply {
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        let idx = i.min(self.replies.len().saturating_sub(1));
        self.replies
            .get(idx)
            .cloned()
            .unwrap_or_else(|| Reply::Text(String::new()))
    }
}

/// Answers by the first rule whose needle occurs in the prompt.
///
/// Sequence rules yield their replies in order and then repeat the last one.
pub struct ScriptedGenerator {
    rules: Vec<Rule>,
    fallback: Reply,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Reply::Text("OK".into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn on(self, needle: &str, reply: impl Into<Reply>) -> Self {
        self.on_sequence(needle, vec![reply.into()])
    }

    pub fn on_sequence(mut self, needle: &str, replies: Vec<Reply>) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            replies,
            cursor: AtomicUsize::new(0),
        });
        self
    }

    pub fn otherwise(mut self, reply: impl Into<Reply>) -> Self {
        self.fallback = reply.into();
        self
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn calls_matching(&self, needle: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(needle)).count()
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

async fn play(reply: Reply) -> Result<String> {
    match reply {
        Reply::Text(t) => Ok(t),
        Reply::Fail(reason) => Err(SwitchboardError::Generation(reason)),
        Reply::Hang => {
            futures::future::pending::<()>().await;
            Ok(String::new())
        }
    }
}

impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
        let reply = self
            .rules
            .iter()
            .find(|r| prompt.contains(&r.needle))
            .map(Rule::next)
            .unwrap_or_else(|| self.fallback.clone());
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt);
        }
        Box::pin(play(reply))
    }
}

/// Always returns the same text; counts calls.
pub struct StaticGenerator {
    text: String,
    calls: AtomicUsize,
}

impl StaticGenerator {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Generator for StaticGenerator {
    fn name(&self) -> &str {
        "static"
    }

    fn generate(&self, _prompt: String) -> BoxFuture<'_, Result<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self.text.clone();
        Box::pin(async move { Ok(text) })
    }
}

/// Always errors.
pub struct FailingGenerator {
    reason: String,
}

impl FailingGenerator {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl Generator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    fn generate(&self, _prompt: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(play(Reply::Fail(self.reason.clone())))
    }
}

/// Never completes.
pub struct HangingGenerator;

impl Generator for HangingGenerator {
    fn name(&self) -> &str {
        "hanging"
    }

    fn generate(&self, _prompt: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(play(Reply::Hang))
    }
}

// ── Mock specialist service ─────────────────────────────────────

/// How the mock answers one `POST /process` attempt.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Answer(String),
    Status(u16),
    /// Sleeps long enough for any test timeout to fire.
    Hang,
    /// 200 with a body that is not JSON.
    Garbage,
    /// 200 with JSON lacking the `answer` field.
    NoAnswerField,
}

struct MockState {
    script: Vec<MockResponse>,
    hits: AtomicUsize,
    questions: Mutex<Vec<String>>,
    root_status: u16,
}

/// An HTTP specialist on an ephemeral local port. Stops when dropped.
pub struct MockSpecialist {
    pub base_url: String,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockSpecialist {
    /// Attempt `n` gets `script[n]`; the last entry repeats.
    pub async fn spawn(script: Vec<MockResponse>) -> Self {
        Self::spawn_with_root(script, 200).await
    }

    /// Same as [`spawn`](Self::spawn) with a chosen status for `GET /`.
    pub async fn spawn_with_root(script: Vec<MockResponse>, root_status: u16) -> Self {
        let state = Arc::new(MockState {
            script,
            hits: AtomicUsize::new(0),
            questions: Mutex::new(Vec::new()),
            root_status,
        });

        let app = Router::new()
            .route("/", get(mock_root))
            .route("/process", post(mock_process))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            handle,
        }
    }

    /// Number of `POST /process` requests received.
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Questions received, in arrival order.
    pub fn questions(&self) -> Vec<String> {
        self.state
            .questions
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }
}

impl Drop for MockSpecialist {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A base URL on which nothing listens.
pub async fn unreachable_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}", addr)
}

async fn mock_root(State(state): State<Arc<MockState>>) -> Response {
    let status = StatusCode::from_u16(state.root_status).unwrap_or(StatusCode::OK);
    (
        status,
        Json(serde_json::json!({ "service": "Mock Specialist", "status": "running" })),
    )
        .into_response()
}

async fn mock_process(
    State(state): State<Arc<MockState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let attempt = state.hits.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut questions) = state.questions.lock() {
        questions.push(body["question"].as_str().unwrap_or_default().to_string());
    }

    let idx = attempt.min(state.script.len().saturating_sub(1));
    let behaviour = state
        .script
        .get(idx)
        .cloned()
        .unwrap_or(MockResponse::Status(500));

    match behaviour {
        MockResponse::Answer(answer) => {
            Json(serde_json::json!({ "answer": answer })).into_response()
        }
        MockResponse::Status(code) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "mock failure",
        )
            .into_response(),
        MockResponse::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
        MockResponse::Garbage => (StatusCode::OK, "<html>not json</html>").into_response(),
        MockResponse::NoAnswerField => {
            Json(serde_json::json!({ "result": "misnamed" })).into_response()
        }
    }
}
