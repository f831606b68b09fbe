use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use switchboard_core::registry::AgentRegistry;
use switchboard_core::types::{Completion, SpecialistId};
use switchboard_llm::GenerationAdapter;

/// Identifiers checked against the classifier output, first match wins.
/// Anything that matches none of them is handled by the orchestrator.
const ROUTING_TABLE: [(&str, SpecialistId); 3] = [
    ("agent_math", SpecialistId::Math),
    ("agent_coding", SpecialistId::Coding),
    ("agent_creative", SpecialistId::Creative),
];

/// Picks the specialist for a request with one classification call.
pub struct Router {
    adapter: GenerationAdapter,
    registry: Arc<AgentRegistry>,
    timeout: Duration,
}

impl Router {
    pub fn new(adapter: GenerationAdapter, registry: Arc<AgentRegistry>, timeout: Duration) -> Self {
        Self {
            adapter,
            registry,
            timeout,
        }
    }

    pub fn build_prompt(&self, request_text: &str) -> String {
        let mut specialists = String::new();
        for entry in self.registry.remote() {
            specialists.push_str(&format!(
                "- {} Agent ({})\n",
                entry.id.label(),
                entry.specialty
            ));
        }
        specialists.push_str(&format!(
            "- Self (handle directly for {})\n",
            self.registry.specialty(SpecialistId::Orchestrator)
        ));

        let options = ROUTING_TABLE
            .iter()
            .map(|(key, _)| format!("\"{}\"", key))
            .chain(std::iter::once("\"self\"".to_string()))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"Choose the specialist agent best suited to answer this user query.

User query: "{}"

Available specialists:
{}
Reply with exactly one of {} and nothing else:"#,
            request_text, specialists, options
        )
    }

    /// Exactly one generation call, no retry. Failures resolve to the orchestrator.
    pub async fn decide(&self, request_text: &str) -> SpecialistId {
        let prompt = self.build_prompt(request_text);
        let output = match self.adapter.completion(&prompt, self.timeout).await {
            Completion::Text(text) => text,
            // Fallback text never names a specialist, even if the failure reason does
            other => {
                warn!(completion = ?other, "Router classification unavailable");
                return SpecialistId::Orchestrator;
            }
        };
        let decision = classify(&output);

        let preview: String = request_text.chars().take(50).collect();
        info!(
            request = %preview,
            output = %output.trim(),
            specialist = %decision,
            "Routing decision"
        );
        decision
    }
}

/// Case-insensitive substring match in fixed priority order, defaulting to the orchestrator.
pub fn classify(output: &str) -> SpecialistId {
    let lowered = output.trim().to_lowercase();
    ROUTING_TABLE
        .iter()
        .find(|(key, _)| lowered.contains(key))
        .map(|&(_, id)| id)
        .unwrap_or(SpecialistId::Orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_test_utils::{FailingGenerator, HangingGenerator, ScriptedGenerator, StaticGenerator};

    fn router_with(gen: Arc<dyn switchboard_core::traits::Generator>) -> Router {
        Router::new(
            GenerationAdapter::new(gen, Duration::from_secs(15)),
            Arc::new(AgentRegistry::default()),
            Duration::from_secs(15),
        )
    }

    #[test]
    fn test_classify_exact_keys() {
        assert_eq!(classify("agent_math"), SpecialistId::Math);
        assert_eq!(classify("agent_coding"), SpecialistId::Coding);
        assert_eq!(classify("agent_creative"), SpecialistId::Creative);
        assert_eq!(classify("self"), SpecialistId::Orchestrator);
    }

    #[test]
    fn test_classify_substring_amid_text() {
        assert_eq!(
            classify("I would pick \"AGENT_CODING\" because this is about Rust."),
            SpecialistId::Coding
        );
    }

    #[test]
    fn test_classify_priority_order() {
        // Math outranks coding even when coding appears first
        assert_eq!(classify("agent_coding or maybe agent_math"), SpecialistId::Math);
        assert_eq!(classify("agent_creative, agent_coding"), SpecialistId::Coding);
    }

    #[test]
    fn test_classify_unrecognized_defaults_to_self() {
        assert_eq!(classify(""), SpecialistId::Orchestrator);
        assert_eq!(classify("the math agent"), SpecialistId::Orchestrator);
        assert_eq!(classify("agent_poetry"), SpecialistId::Orchestrator);
    }

    #[test]
    fn test_prompt_lists_every_specialty() {
        let router = router_with(Arc::new(StaticGenerator::new("")));
        let prompt = router.build_prompt("What is 2+2?");
        assert!(prompt.contains("What is 2+2?"));
        assert!(prompt.contains("mathematical problems and calculations"));
        assert!(prompt.contains("programming and software development"));
        assert!(prompt.contains("creative and open-ended questions"));
        assert!(prompt.contains("general knowledge and conversation"));
        assert!(prompt.contains("\"agent_math\", \"agent_coding\", \"agent_creative\", \"self\""));
    }

    #[tokio::test]
    async fn test_decide_uses_model_output() {
        let gen = Arc::new(ScriptedGenerator::new().on("Available specialists", "  Agent_Coding\n"));
        let router = router_with(gen.clone());
        assert_eq!(router.decide("fix my borrow checker error").await, SpecialistId::Coding);
        assert_eq!(gen.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_decide_failure_becomes_self() {
        // The failure reason is never parsed for identifiers
        let router = router_with(Arc::new(FailingGenerator::new("agent_math exploded")));
        assert_eq!(router.decide("anything").await, SpecialistId::Orchestrator);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decide_timeout_becomes_self() {
        let router = router_with(Arc::new(HangingGenerator));
        assert_eq!(router.decide("anything").await, SpecialistId::Orchestrator);
    }
}
