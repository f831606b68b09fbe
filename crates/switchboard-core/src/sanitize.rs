use std::sync::OnceLock;

use regex::Regex;

/// Disclaimer lead-ins removed together with the rest of their sentence.
pub const DISCLAIMER_LEAD_INS: &[&str] = &[
    "As an AI",
    "As a language model",
    "I don't have personal",
    "I'm just an AI",
    "I am an AI",
];

struct Patterns {
    think_blocks: Regex,
    disclaimers: Vec<Regex>,
    whitespace: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        think_blocks: Regex::new(r"(?s)<think>.*?</think>").expect("static regex"),
        disclaimers: disclaimer_patterns(DISCLAIMER_LEAD_INS),
        whitespace: Regex::new(r"\s+").expect("static regex"),
    })
}

/// Build "lead-in up to the next period" patterns, case-insensitive.
pub fn disclaimer_patterns(lead_ins: &[&str]) -> Vec<Regex> {
    lead_ins
        .iter()
        .map(|lead| {
            Regex::new(&format!(r"(?i){}.*?\.", regex::escape(lead))).expect("escaped literal")
        })
        .collect()
}

fn pass(text: &str, disclaimers: &[Regex]) -> String {
    let p = patterns();
    let mut out = p.think_blocks.replace_all(text, "").into_owned();
    for re in disclaimers {
        out = re.replace_all(&out, "").into_owned();
    }
    p.whitespace.replace_all(&out, " ").trim().to_string()
}

/// Strip `<think>` blocks and disclaimer sentences, then collapse whitespace.
///
/// Runs to a fixed point, so `sanitize(sanitize(x)) == sanitize(x)` even when a
/// removal or whitespace collapse exposes a new match.
pub fn sanitize(text: &str) -> String {
    sanitize_with(text, &patterns().disclaimers)
}

/// Same as [`sanitize`] with a caller-supplied disclaimer list.
pub fn sanitize_with(text: &str, disclaimers: &[Regex]) -> String {
    let mut current = pass(text, disclaimers);
    loop {
        let next = pass(&current, disclaimers);
        // Every pass either shrinks the text or leaves it unchanged.
        if next == current {
            return current;
        }
        current = next;
    }
}
