use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use switchboard_core::traits::Generator;
use switchboard_core::types::Completion;

/// Wraps the shared generator with a per-call timeout and never fails.
///
/// [`completion`](Self::completion) keeps the failure class for callers that
/// branch on it; [`complete`](Self::complete) flattens everything into display text.
#[derive(Clone)]
pub struct GenerationAdapter {
    generator: Arc<dyn Generator>,
    default_timeout: Duration,
}

impl GenerationAdapter {
    pub fn new(generator: Arc<dyn Generator>, default_timeout: Duration) -> Self {
        Self {
            generator,
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// One generation call, bounded by `timeout`.
    pub async fn completion(&self, prompt: &str, timeout: Duration) -> Completion {
        debug!(
            backend = %self.generator.name(),
            timeout_ms = timeout.as_millis() as u64,
            prompt_chars = prompt.chars().count(),
            "Generation call"
        );

        match tokio::time::timeout(timeout, self.generator.generate(prompt.to_string())).await {
            Ok(Ok(text)) => Completion::Text(text),
            Ok(Err(e)) => {
                error!(backend = %self.generator.name(), error = %e, "Generation failed");
                Completion::Failed(e.to_string())
            }
            Err(_) => {
                warn!(
                    backend = %self.generator.name(),
                    timeout_secs = timeout.as_secs_f64(),
                    "Generation timed out"
                );
                Completion::TimedOut
            }
        }
    }

    /// Displayable text for `prompt`; failures become fixed fallback strings.
    pub async fn complete(&self, prompt: &str, timeout: Duration) -> String {
        self.completion(prompt, timeout).await.into_display_text()
    }

    /// [`complete`](Self::complete) with the default timeout.
    pub async fn complete_default(&self, prompt: &str) -> String {
        self.complete(prompt, self.default_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::types::GENERATION_TIMEOUT_TEXT;
    use switchboard_test_utils::{FailingGenerator, HangingGenerator, StaticGenerator};

    #[tokio::test]
    async fn test_text_passes_through() {
        let gen = Arc::new(StaticGenerator::new("hello"));
        let adapter = GenerationAdapter::new(gen.clone(), Duration::from_secs(15));
        assert_eq!(
            adapter.completion("hi", Duration::from_secs(1)).await,
            Completion::Text("hello".into())
        );
        assert_eq!(gen.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_apology() {
        let adapter =
            GenerationAdapter::new(Arc::new(HangingGenerator), Duration::from_secs(15));
        assert_eq!(
            adapter.completion("hi", Duration::from_secs(15)).await,
            Completion::TimedOut
        );
        assert_eq!(adapter.complete_default("hi").await, GENERATION_TIMEOUT_TEXT);
    }

    #[tokio::test]
    async fn test_failure_embeds_reason() {
        let adapter = GenerationAdapter::new(
            Arc::new(FailingGenerator::new("model not found")),
            Duration::from_secs(15),
        );
        let completion = adapter.completion("hi", Duration::from_secs(1)).await;
        assert!(matches!(completion, Completion::Failed(ref r) if r.contains("model not found")));
        let text = adapter.complete("hi", Duration::from_secs(1)).await;
        assert!(text.contains("model not found"));
    }
}
