pub mod health;
pub mod routes;
pub mod server;
pub mod state;

pub use health::{HealthProber, HealthReport};
pub use server::{build_router, GatewayServer};
pub use state::AppState;
