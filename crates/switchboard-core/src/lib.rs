pub mod config;
pub mod error;
pub mod registry;
pub mod sanitize;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, SwitchboardError};
pub use registry::AgentRegistry;
pub use sanitize::sanitize;
pub use types::*;
