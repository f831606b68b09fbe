use std::sync::Arc;

use switchboard_core::registry::AgentRegistry;
use switchboard_core::sanitize;
use switchboard_core::types::SpecialistId;
use switchboard_llm::GenerationAdapter;

/// Short conversational messages around a delegation. Pure flavor: a failed
/// generation yields the adapter's fallback text instead of an error.
pub struct Narrator {
    adapter: GenerationAdapter,
    registry: Arc<AgentRegistry>,
}

impl Narrator {
    pub fn new(adapter: GenerationAdapter, registry: Arc<AgentRegistry>) -> Self {
        Self { adapter, registry }
    }

    /// Announces that the request is being handed to a specialist.
    pub async fn intro(&self, id: SpecialistId, request_text: &str) -> String {
        let prompt = format!(
            r#"You coordinate a team of AI specialists. The user wrote: "{}"

You are passing this to your specialist in {}.

Write one short, friendly sentence telling the user you are bringing in that specialist.
Do not restate or paraphrase their question.
Examples: "Let me bring in our math expert for this." or "I'll hand this to our programming specialist.""#,
            request_text,
            self.registry.specialty(id)
        );
        self.say(&prompt).await
    }

    /// Closing remark after the specialist's answer.
    pub async fn followup(&self, id: SpecialistId, request_text: &str) -> String {
        let prompt = format!(
            r#"You coordinate a team of AI specialists. The user asked: "{}"
Your specialist in {} has just answered.

Write a brief, friendly closing remark or follow-up question.
Example: "Hope that helps! Let me know if anything needs clarifying.""#,
            request_text,
            self.registry.specialty(id)
        );
        self.say(&prompt).await
    }

    /// Tells the user the answer is being refined.
    pub async fn retry_notice(&self, id: SpecialistId) -> String {
        let prompt = format!(
            r#"You coordinate a team of AI specialists and want more detail from your specialist in {}.

Write a short, natural transition message for the user, such as
"Let me get a few more details on that..." or "I think we can improve that answer. One moment...""#,
            self.registry.specialty(id)
        );
        self.say(&prompt).await
    }

    /// Sanitized generation with double quotes dropped.
    async fn say(&self, prompt: &str) -> String {
        let text = self.adapter.complete_default(prompt).await;
        sanitize(&text.replace('"', ""))
    }
}
