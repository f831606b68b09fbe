use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use switchboard_core::types::SessionRequest;

use crate::health::HealthReport;
use crate::state::AppState;

// GET /
pub async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Switchboard",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "/": "This help information",
            "/query": "Streamed answer (GET ?user_input=... or POST {\"text\": ...})",
            "/health": "Specialist reachability and orchestrator status",
        }
    }))
}

// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.prober.report().await)
}

#[derive(Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub user_input: String,
}

#[derive(Deserialize)]
pub struct QueryBody {
    #[serde(default)]
    pub text: String,
}

// GET /query?user_input=...
pub async fn query_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Response {
    stream_session(state, params.user_input)
}

// POST /query
pub async fn query_post(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueryBody>,
) -> Response {
    stream_session(state, body.text)
}

/// Start a session and stream its events as SSE frames.
///
/// Dropping the response stream (client gone) cancels the session.
fn stream_session(state: Arc<AppState>, text: String) -> Response {
    let request = match SessionRequest::new(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Rejected query");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    info!(session = %request.id, "Query received");
    let cancel = CancellationToken::new();
    let rx = state.controller.clone().start(request, cancel.clone());
    let guard = cancel.drop_guard();

    let stream = ReceiverStream::new(rx).map(move |event| {
        let _alive = &guard;
        Event::default().event(event.kind()).json_data(&event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use switchboard_agent::SessionController;
    use switchboard_core::config::AppConfig;
    use switchboard_test_utils::{MockResponse, MockSpecialist, ScriptedGenerator};

    use crate::health::HealthProber;
    use crate::server::build_router;

    fn app(config: &AppConfig, gen: Arc<ScriptedGenerator>) -> axum::Router {
        let controller = Arc::new(SessionController::from_config(config, gen));
        let prober = HealthProber::new(controller.registry().clone(), std::time::Duration::from_secs(3));
        build_router(Arc::new(AppState {
            controller,
            prober,
        }))
    }

    async fn body_text(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let app = app(&AppConfig::default(), Arc::new(ScriptedGenerator::new()));
        let resp = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["status"], "running");
        assert!(json["endpoints"]["/query"].is_string());
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected_before_session() {
        let gen = Arc::new(ScriptedGenerator::new());
        let app = app(&AppConfig::default(), gen.clone());

        let resp = app
            .clone()
            .oneshot(Request::get("/query?user_input=%20%20").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(Request::get("/query").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(gen.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_direct_query_streams_one_frame() {
        let gen = Arc::new(
            ScriptedGenerator::new()
                .on("Available specialists", "self")
                .otherwise("Paris."),
        );
        let app = app(&AppConfig::default(), gen);

        let resp = app
            .oneshot(
                Request::get("/query?user_input=capital%20of%20France")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let body = body_text(resp).await;
        assert!(body.contains("event: direct"));
        assert!(body.contains(r#"data: {"type":"direct","text":"Paris."}"#));
        assert_eq!(body.matches("event:").count(), 1);
    }

    #[tokio::test]
    async fn test_post_query_streams_ordered_frames() {
        let mock = MockSpecialist::spawn(vec![MockResponse::Answer("4".into())]).await;
        let mut config = AppConfig::default();
        config.specialists.math.endpoint = Some(mock.base_url.clone());
        let gen = Arc::new(
            ScriptedGenerator::new()
                .on("Available specialists", "agent_math")
                .on("Specialist answer:", "SATISFACTORY")
                .on("bringing in", "Fetching our math expert.")
                .on("closing remark", "Anything else?"),
        );
        let app = app(&config, gen);

        let resp = app
            .oneshot(
                Request::post("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text":"What is 2+2?"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_text(resp).await;
        let intro = body.find("event: intro").unwrap();
        let answer = body.find("event: specialist_answer").unwrap();
        let followup = body.find("event: followup").unwrap();
        assert!(intro < answer && answer < followup);
        assert!(body.contains(r#""specialist":"agent_math","text":"4""#));
        assert!(!body.contains("event: error"));
    }

    #[tokio::test]
    async fn test_client_disconnect_stops_session() {
        let mock = MockSpecialist::spawn(vec![MockResponse::Hang]).await;
        let mut config = AppConfig::default();
        config.specialists.math.endpoint = Some(mock.base_url.clone());
        config.dispatch.request_timeout_secs = 1;
        config.dispatch.max_retries = 3;
        config.dispatch.retry_delay_secs = 0;
        let gen = Arc::new(
            ScriptedGenerator::new()
                .on("Available specialists", "agent_math")
                .on("bringing in", "One moment.")
                .on("closing remark", "Anything else?"),
        );
        let app = app(&config, gen.clone());

        let resp = app
            .oneshot(Request::get("/query?user_input=integrate%20x").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut frames = resp.into_body().into_data_stream();
        let first = frames.next().await.unwrap().unwrap();
        assert!(String::from_utf8_lossy(&first).contains("event: intro"));

        while mock.hits() == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        drop(frames);

        // A live session would time out after 1s and try the specialist again
        tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
        assert_eq!(mock.hits(), 1);
        assert_eq!(gen.calls_matching("closing remark"), 0);
    }

    #[tokio::test]
    async fn test_health_endpoint_reports_agents() {
        let app = app(&AppConfig::default(), Arc::new(ScriptedGenerator::new()));
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        for key in ["agent_math", "agent_coding", "agent_creative"] {
            assert!(json["agents"][key]["reachable"].is_boolean());
        }
        assert_eq!(json["orchestrator"]["reachable"], true);
    }
}
