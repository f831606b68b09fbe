use std::time::Duration;

use switchboard_core::types::SpecialistId;

/// Disclaimer lead-ins a specialist strips from its own output, on top of `<think>` blocks.
pub const SPECIALIST_DISCLAIMERS: &[&str] = &[
    "As a language model",
    "I am just an AI",
    "I am not sure",
    "I don't have direct knowledge",
    "I am not capable",
    "As an AI",
    "I don't have the ability",
];

/// How one specialist presents itself and talks to its model.
#[derive(Debug)]
pub struct Persona {
    pub id: SpecialistId,
    pub service_name: &'static str,
    system_prompt: &'static str,
    question_label: &'static str,
    pub timeout: Duration,
    pub failure_text: &'static str,
    pub timeout_text: &'static str,
}

impl Persona {
    /// System prompt followed by the labelled question.
    pub fn prompt(&self, question: &str) -> String {
        format!("{}\n\n{}:\n{}", self.system_prompt, self.question_label, question)
    }
}

static MATH: Persona = Persona {
    id: SpecialistId::Math,
    service_name: "Math Specialist Agent",
    system_prompt: "You are an expert mathematician. \
        Provide clear, concise, and correct mathematical explanations. \
        Use equations, step-by-step solutions, and examples when appropriate. \
        Be extremely precise with numbers and formulas. \
        Avoid disclaimers about AI capabilities. \
        Focus on solving or explaining the math problem directly.",
    question_label: "Mathematical problem or question",
    timeout: Duration::from_secs(90),
    failure_text: "Error processing the mathematical query. Please try again.",
    timeout_text: "The mathematical computation took too long. Try simplifying the query.",
};

static CODING: Persona = Persona {
    id: SpecialistId::Coding,
    service_name: "Coding Specialist Agent",
    system_prompt: "You are an expert software engineer and programmer. \
        Provide clean, efficient, and well-documented code examples. \
        Explain complex concepts clearly using practical examples. \
        Consider edge cases and performance implications. \
        Format code properly with syntax highlighting when relevant. \
        Avoid disclaimers about AI capabilities. \
        Focus on solving the programming problem directly.",
    question_label: "Coding question or problem",
    timeout: Duration::from_secs(15),
    failure_text: "Error processing the coding query. Please try again.",
    timeout_text: "The coding analysis took too long. Try breaking the query into smaller parts.",
};

static CREATIVE: Persona = Persona {
    id: SpecialistId::Creative,
    service_name: "Creative Specialist Agent",
    system_prompt: "You are a creative specialist with a distinctive voice. \
        Express ideas with vivid imagery, metaphors, or stories. \
        Be playful, witty, and engaging in your responses. \
        Avoid generic phrases and clichés. \
        Avoid disclaimers about AI capabilities. \
        Be concise yet impactful.",
    question_label: "Creative prompt or question",
    timeout: Duration::from_secs(15),
    failure_text: "Error processing the creative request. Please try again.",
    timeout_text: "The creative process took too long. Try a simpler or shorter prompt.",
};

/// The persona for a remote specialist. The orchestrator has none.
pub fn persona(id: SpecialistId) -> Option<&'static Persona> {
    match id {
        SpecialistId::Math => Some(&MATH),
        SpecialistId::Coding => Some(&CODING),
        SpecialistId::Creative => Some(&CREATIVE),
        SpecialistId::Orchestrator => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_remote_specialist_has_a_persona() {
        for id in SpecialistId::REMOTE {
            assert_eq!(persona(id).map(|p| p.id), Some(id));
        }
        assert!(persona(SpecialistId::Orchestrator).is_none());
    }

    #[test]
    fn test_math_gets_the_long_timeout() {
        assert_eq!(persona(SpecialistId::Math).unwrap().timeout, Duration::from_secs(90));
        assert_eq!(persona(SpecialistId::Creative).unwrap().timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = persona(SpecialistId::Coding).unwrap().prompt("reverse a list");
        assert!(prompt.starts_with("You are an expert software engineer"));
        assert!(prompt.ends_with("Coding question or problem:\nreverse a list"));
    }
}
