use std::sync::Arc;

use switchboard_agent::SessionController;

use crate::health::HealthProber;

/// Shared application state for axum handlers.
pub struct AppState {
    pub controller: Arc<SessionController>,
    pub prober: HealthProber,
}
