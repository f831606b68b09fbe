use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use regex::Regex;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use switchboard_core::error::{Result, SwitchboardError};
use switchboard_core::sanitize::{disclaimer_patterns, sanitize_with};
use switchboard_core::types::{Completion, SpecialistId};
use switchboard_llm::GenerationAdapter;

use crate::persona::{persona, Persona, SPECIALIST_DISCLAIMERS};

/// One specialist behind `POST /process`.
pub struct SpecialistService {
    persona: &'static Persona,
    adapter: GenerationAdapter,
    model: String,
    listen: String,
    disclaimers: Vec<Regex>,
}

impl SpecialistService {
    pub fn new(id: SpecialistId, adapter: GenerationAdapter, model: &str, listen: &str) -> Result<Self> {
        let persona = persona(id).ok_or_else(|| SwitchboardError::UnknownSpecialist(id.key().to_string()))?;
        Ok(Self {
            persona,
            adapter,
            model: model.to_string(),
            listen: listen.to_string(),
            disclaimers: disclaimer_patterns(SPECIALIST_DISCLAIMERS),
        })
    }

    pub fn persona(&self) -> &'static Persona {
        self.persona
    }

    /// Answer one question. Generation problems become the persona's fallback text.
    pub async fn answer(&self, question: &str) -> String {
        let prompt = self.persona.prompt(question);
        info!(specialist = %self.persona.id, model = %self.model, "Invoking model");

        match self.adapter.completion(&prompt, self.persona.timeout).await {
            Completion::Text(text) => sanitize_with(&text, &self.disclaimers),
            Completion::TimedOut => {
                warn!(specialist = %self.persona.id, timeout = ?self.persona.timeout, "Model timed out");
                self.persona.timeout_text.to_string()
            }
            Completion::Failed(reason) => {
                error!(specialist = %self.persona.id, error = %reason, "Model failed");
                self.persona.failure_text.to_string()
            }
        }
    }

    /// Serve until the cancellation token is triggered.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listen = self.listen.clone();
        let id = self.persona.id;
        let app = build_router(Arc::new(self));

        let listener = TcpListener::bind(&listen)
            .await
            .map_err(|e| SwitchboardError::Gateway(format!("bind {}: {}", listen, e)))?;
        info!(specialist = %id, bind = %listen, "Specialist listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!(specialist = %id, "Specialist shut down");
        Ok(())
    }
}

pub fn build_router(service: Arc<SpecialistService>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/process", post(process))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

#[derive(Deserialize)]
pub struct ProcessBody {
    #[serde(default)]
    pub question: String,
}

// GET /
async fn index(State(service): State<Arc<SpecialistService>>) -> Json<serde_json::Value> {
    let port = service.listen.rsplit(':').next().unwrap_or_default();
    Json(serde_json::json!({
        "service": service.persona.service_name,
        "model": service.model,
        "status": "running",
        "port": port,
    }))
}

// POST /process
async fn process(
    State(service): State<Arc<SpecialistService>>,
    Json(body): Json<ProcessBody>,
) -> Response {
    let question = body.question.trim();
    if question.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "detail": "Missing 'question' in request body" })),
        )
            .into_response();
    }

    let preview: String = question.chars().take(100).collect();
    info!(specialist = %service.persona.id, question = %preview, "Received question");

    let answer = service.answer(question).await;
    Json(serde_json::json!({ "answer": answer })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use switchboard_core::traits::Generator;
    use switchboard_test_utils::{FailingGenerator, HangingGenerator, ScriptedGenerator};

    fn service(id: SpecialistId, gen: Arc<dyn Generator>) -> Arc<SpecialistService> {
        let adapter = GenerationAdapter::new(gen, Duration::from_secs(15));
        Arc::new(SpecialistService::new(id, adapter, "deepseek-r1", "0.0.0.0:8001").unwrap())
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn process_request(body: &str) -> Request<Body> {
        Request::post("/process")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_process_returns_cleaned_answer() {
        let gen = Arc::new(ScriptedGenerator::new().on(
            "Mathematical problem or question",
            "<think>2 plus 2</think> I am not sure this is right. The answer is 4.",
        ));
        let app = build_router(service(SpecialistId::Math, gen.clone()));

        let resp = app.oneshot(process_request(r#"{"question":"What is 2+2?"}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["answer"], "The answer is 4.");
        assert!(gen.prompts()[0].starts_with("You are an expert mathematician."));
        assert!(gen.prompts()[0].ends_with("What is 2+2?"));
    }

    #[tokio::test]
    async fn test_blank_question_is_bad_request() {
        let gen = Arc::new(ScriptedGenerator::new());
        let app = build_router(service(SpecialistId::Math, gen.clone()));

        let resp = app
            .clone()
            .oneshot(process_request(r#"{"question":"   "}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app.oneshot(process_request("{}")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(gen.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_index_describes_service() {
        let app = build_router(service(SpecialistId::Math, Arc::new(ScriptedGenerator::new())));
        let resp = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = json_body(resp).await;
        assert_eq!(json["service"], "Math Specialist Agent");
        assert_eq!(json["model"], "deepseek-r1");
        assert_eq!(json["port"], "8001");
    }

    #[tokio::test]
    async fn test_generation_failure_uses_persona_text() {
        let svc = service(SpecialistId::Coding, Arc::new(FailingGenerator::new("exit 1")));
        assert_eq!(
            svc.answer("reverse a list").await,
            "Error processing the coding query. Please try again."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_uses_persona_text() {
        let svc = service(SpecialistId::Creative, Arc::new(HangingGenerator));
        assert_eq!(
            svc.answer("a haiku").await,
            "The creative process took too long. Try a simpler or shorter prompt."
        );
    }

    #[test]
    fn test_orchestrator_cannot_be_served() {
        let adapter = GenerationAdapter::new(Arc::new(ScriptedGenerator::new()), Duration::from_secs(1));
        assert!(SpecialistService::new(SpecialistId::Orchestrator, adapter, "llama3.2", "0.0.0.0:0").is_err());
    }
}
