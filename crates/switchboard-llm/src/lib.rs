pub mod adapter;
pub mod providers;

use std::sync::Arc;

use switchboard_core::config::GenerationConfig;
use switchboard_core::error::{Result, SwitchboardError};
use switchboard_core::traits::Generator;

pub use adapter::GenerationAdapter;
pub use providers::ollama::OllamaCliClient;
pub use providers::openai::OpenAiCompatClient;

/// Create a generator for `model` using the configured provider.
pub fn create_generator(config: &GenerationConfig, model: &str) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaCliClient::new(model))),
        "openai" | "openai-compatible" | "ollama-http" => Ok(Arc::new(OpenAiCompatClient::new(
            model,
            config.base_url.clone(),
            config.api_key.clone(),
        ))),
        other => Err(SwitchboardError::UnsupportedProvider(other.to_string())),
    }
}
