use std::time::Duration;

use tracing::{debug, info};

use switchboard_core::types::Evaluation;
use switchboard_llm::GenerationAdapter;

const SATISFACTORY: &str = "SATISFACTORY";
const NEEDS_IMPROVEMENT: &str = "NEEDS_IMPROVEMENT";

/// Used when the judge flags the answer but gives no reason.
pub const MISSING_GUIDANCE: &str = "Please be more comprehensive and accurate in your response.";

/// Used when the judge ignores the output format.
pub const UNPARSEABLE_GUIDANCE: &str =
    "Please provide a more helpful response to the user's question.";

/// LLM judge for specialist answers.
pub struct Evaluator {
    adapter: GenerationAdapter,
    truncate_chars: usize,
    timeout: Duration,
}

impl Evaluator {
    pub fn new(adapter: GenerationAdapter, truncate_chars: usize, timeout: Duration) -> Self {
        Self {
            adapter,
            truncate_chars,
            timeout,
        }
    }

    pub fn build_prompt(&self, request_text: &str, specialty: &str, reply_text: &str) -> String {
        let reply = truncate_chars(reply_text, self.truncate_chars);
        format!(
            r#"You are reviewing an answer written by a specialist in {}.

User question: "{}"
Specialist answer: "{}"

Judge only whether the answer is relevant to the question, technically accurate,
and complete enough to be useful.

Respond in exactly one of these forms:
SATISFACTORY
NEEDS_IMPROVEMENT: <what is missing or wrong>"#,
            specialty, request_text, reply
        )
    }

    /// Judge `reply_text`. Generation failures read as "needs improvement".
    pub async fn evaluate(&self, request_text: &str, specialty: &str, reply_text: &str) -> Evaluation {
        let prompt = self.build_prompt(request_text, specialty, reply_text);
        let output = self.adapter.complete(&prompt, self.timeout).await;
        let evaluation = parse_evaluation(&output);

        let preview: String = output.trim().chars().take(50).collect();
        info!(
            satisfactory = evaluation.satisfactory,
            output = %preview,
            "Evaluation result"
        );
        evaluation
    }
}

/// Parse the judge's reply.
///
/// Anything that does not start with `SATISFACTORY` counts against the answer.
pub fn parse_evaluation(output: &str) -> Evaluation {
    let trimmed = output.trim();

    if trimmed.starts_with(SATISFACTORY) {
        return Evaluation::satisfactory();
    }

    if trimmed.contains(NEEDS_IMPROVEMENT) {
        // Guidance is everything after the first colon of the whole output.
        let guidance = trimmed
            .split_once(':')
            .map(|(_, rest)| rest.trim())
            .filter(|g| !g.is_empty())
            .unwrap_or(MISSING_GUIDANCE);
        return Evaluation::needs_improvement(guidance);
    }

    debug!(output = %trimmed, "Judge ignored the output format");
    Evaluation::needs_improvement(UNPARSEABLE_GUIDANCE)
}

/// First `max` characters, with an ellipsis when anything was cut.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
