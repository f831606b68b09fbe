use std::process::Stdio;

use futures::future::BoxFuture;
use tokio::process::Command;
use tracing::debug;

use switchboard_core::error::{Result, SwitchboardError};
use switchboard_core::traits::Generator;

/// Runs `ollama run <model> <prompt>` as a child process per call.
pub struct OllamaCliClient {
    binary: String,
    model: String,
}

impl OllamaCliClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            binary: "ollama".to_string(),
            model: model.into(),
        }
    }

    /// Use a different executable (tests, wrappers).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

impl Generator for OllamaCliClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn generate(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let preview: String = prompt.chars().take(100).collect();
            debug!(model = %self.model, prompt = %preview, "Invoking ollama");

            // kill_on_drop: the adapter drops this future on timeout
            let output = Command::new(&self.binary)
                .arg("run")
                .arg(&self.model)
                .arg(&prompt)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await?;

            if !output.status.success() {
                return Err(SwitchboardError::GenerationExit {
                    code: output.status.code().unwrap_or(-1),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }

            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        })
    }
}
