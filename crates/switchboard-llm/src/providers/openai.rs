use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use switchboard_core::error::{Result, SwitchboardError};
use switchboard_core::traits::Generator;

/// Ollama's OpenAI-compatible endpoint.
const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";

/// Non-streaming chat-completions client. Works with OpenAI, Ollama, vLLM, Groq, etc.
pub struct OpenAiCompatClient {
    http: Client,
    model: String,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(model: impl Into<String>, base_url: Option<String>, api_key: Option<String>) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            http: Client::new(),
            model: model.into(),
            base_url,
            api_key: api_key.filter(|k| !k.is_empty() && !k.starts_with("${")),
        }
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OaiMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct OaiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn extract_content(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default().trim().to_string())
        .ok_or_else(|| SwitchboardError::Generation("response had no choices".into()))
}

impl Generator for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let url = format!("{}/chat/completions", self.base_url);
            let body = ChatRequest {
                model: &self.model,
                messages: vec![OaiMessage {
                    role: "user",
                    content: &prompt,
                }],
                stream: false,
            };

            debug!(model = %self.model, url = %url, "Sending chat completion");

            let mut req = self.http.post(&url).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            let response = req
                .send()
                .await
                .map_err(|e| SwitchboardError::Generation(e.to_string()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| SwitchboardError::Generation(e.to_string()))?;

            if !status.is_success() {
                warn!(status = %status, "Chat completion request failed");
                return Err(SwitchboardError::Generation(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    text
                )));
            }

            extract_content(&text)
        })
    }
}
