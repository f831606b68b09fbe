use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SwitchboardError};

/// Unique session identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who handles a request. Closed set, fixed at build time.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpecialistId {
    #[serde(rename = "agent_math")]
    Math,
    #[serde(rename = "agent_coding")]
    Coding,
    #[serde(rename = "agent_creative")]
    Creative,
    /// The orchestrator answers directly through the generation capability.
    #[serde(rename = "self")]
    Orchestrator,
}

impl SpecialistId {
    pub const ALL: [SpecialistId; 4] = [
        SpecialistId::Math,
        SpecialistId::Coding,
        SpecialistId::Creative,
        SpecialistId::Orchestrator,
    ];

    /// Remote specialists, in routing priority order.
    pub const REMOTE: [SpecialistId; 3] = [
        SpecialistId::Math,
        SpecialistId::Coding,
        SpecialistId::Creative,
    ];

    /// Wire identifier, also what the router asks the model to answer with.
    pub fn key(&self) -> &'static str {
        match self {
            SpecialistId::Math => "agent_math",
            SpecialistId::Coding => "agent_coding",
            SpecialistId::Creative => "agent_creative",
            SpecialistId::Orchestrator => "self",
        }
    }

    /// Short human-facing name.
    pub fn label(&self) -> &'static str {
        match self {
            SpecialistId::Math => "Math",
            SpecialistId::Coding => "Coding",
            SpecialistId::Creative => "Creative",
            SpecialistId::Orchestrator => "Orchestrator",
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, SpecialistId::Orchestrator)
    }
}

impl fmt::Display for SpecialistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SpecialistId {
    type Err = SwitchboardError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        let bare = normalized.strip_prefix("agent_").unwrap_or(&normalized);
        match bare {
            "math" => Ok(SpecialistId::Math),
            "coding" => Ok(SpecialistId::Coding),
            "creative" => Ok(SpecialistId::Creative),
            "self" | "orchestrator" => Ok(SpecialistId::Orchestrator),
            _ => Err(SwitchboardError::UnknownSpecialist(s.to_string())),
        }
    }
}

/// A caller's query, valid for exactly one session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub id: SessionId,
    pub text: String,
}

impl SessionRequest {
    /// Reject blank input before any session exists.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(SwitchboardError::InvalidRequest(
                "request text must not be empty".into(),
            ));
        }
        Ok(Self {
            id: SessionId::new(),
            text,
        })
    }
}

/// How a dispatch (or a single attempt of one) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Ok,
    Timeout,
    ConnectionFailed,
    BadStatus(u16),
    /// HTTP 200 whose body was not the expected JSON.
    InvalidBody,
    Exhausted,
}

impl ReplyOutcome {
    /// Failures worth another attempt: network trouble, server-side errors, throttling.
    pub fn is_transient(&self) -> bool {
        match self {
            ReplyOutcome::Timeout | ReplyOutcome::ConnectionFailed | ReplyOutcome::InvalidBody => {
                true
            }
            ReplyOutcome::BadStatus(code) => *code >= 500 || *code == 408 || *code == 429,
            ReplyOutcome::Ok | ReplyOutcome::Exhausted => false,
        }
    }
}

impl fmt::Display for ReplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyOutcome::Ok => f.write_str("ok"),
            ReplyOutcome::Timeout => f.write_str("timeout"),
            ReplyOutcome::ConnectionFailed => f.write_str("connection failed"),
            ReplyOutcome::BadStatus(code) => write!(f, "status {}", code),
            ReplyOutcome::InvalidBody => f.write_str("invalid body"),
            ReplyOutcome::Exhausted => f.write_str("exhausted"),
        }
    }
}

/// What the dispatcher got back from a specialist.
#[derive(Debug, Clone)]
pub struct SpecialistReply {
    pub text: String,
    pub outcome: ReplyOutcome,
    /// Number of attempts made (0 for the orchestrator itself).
    pub attempts: u32,
}

impl SpecialistReply {
    pub fn ok(text: impl Into<String>, attempts: u32) -> Self {
        Self {
            text: text.into(),
            outcome: ReplyOutcome::Ok,
            attempts,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == ReplyOutcome::Ok
    }
}

/// Judge verdict on a specialist answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub satisfactory: bool,
    /// Empty when satisfactory.
    pub guidance: String,
}

impl Evaluation {
    pub fn satisfactory() -> Self {
        Self {
            satisfactory: true,
            guidance: String::new(),
        }
    }

    pub fn needs_improvement(guidance: impl Into<String>) -> Self {
        Self {
            satisfactory: false,
            guidance: guidance.into(),
        }
    }
}

/// One externally visible step of a session, in production order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Intro { text: String },
    SpecialistAnswer { specialist: SpecialistId, text: String },
    Refining { text: String },
    Followup { text: String },
    Direct { text: String },
    Error { text: String },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Intro { .. } => "intro",
            SessionEvent::SpecialistAnswer { .. } => "specialist_answer",
            SessionEvent::Refining { .. } => "refining",
            SessionEvent::Followup { .. } => "followup",
            SessionEvent::Direct { .. } => "direct",
            SessionEvent::Error { .. } => "error",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            SessionEvent::Intro { text }
            | SessionEvent::SpecialistAnswer { text, .. }
            | SessionEvent::Refining { text }
            | SessionEvent::Followup { text }
            | SessionEvent::Direct { text }
            | SessionEvent::Error { text } => text,
        }
    }
}

/// Shown to the caller when a session fails unexpectedly.
pub const SESSION_ERROR_TEXT: &str =
    "I'm sorry, there was an error processing your request. Please try again.";

/// Shown in place of generated text when the generation capability times out.
pub const GENERATION_TIMEOUT_TEXT: &str = "Processing took too long. Please try a simpler query.";

/// Result of one call to the generation capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Text(String),
    TimedOut,
    Failed(String),
}

impl Completion {
    /// Collapse into something displayable. Failures become fixed fallback text.
    pub fn into_display_text(self) -> String {
        match self {
            Completion::Text(text) => text,
            Completion::TimedOut => GENERATION_TIMEOUT_TEXT.to_string(),
            Completion::Failed(reason) => {
                format!("Unexpected error in LLM processing: {}", reason)
            }
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Completion::Text(text) => Some(text),
            _ => None,
        }
    }
}
