use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use switchboard_agent::SessionController;
use switchboard_core::config::GatewayConfig;
use switchboard_core::error::SwitchboardError;

use crate::health::HealthProber;
use crate::routes;
use crate::state::AppState;

/// HTTP front door: streamed queries, health, index.
pub struct GatewayServer {
    config: GatewayConfig,
    controller: Arc<SessionController>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, controller: Arc<SessionController>) -> Self {
        Self { config, controller }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let prober = HealthProber::new(
            self.controller.registry().clone(),
            Duration::from_secs(self.config.health_timeout_secs),
        );
        let state = Arc::new(AppState {
            controller: self.controller.clone(),
            prober,
        });
        let app = build_router(state);

        let listener = TcpListener::bind(&self.config.bind)
            .await
            .map_err(|e| SwitchboardError::Gateway(format!("bind {}: {}", self.config.bind, e)))?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/query", get(routes::query_get).post(routes::query_post))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
