use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwitchboardError};
use crate::types::SpecialistId;

/// Top-level Switchboard configuration. Loaded once, read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub specialists: SpecialistsConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Shared text-generation capability used for routing, judging, and narration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// "ollama" runs the local CLI; "openai" speaks the chat-completions API.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_orchestrator_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_orchestrator_model(),
            base_url: None,
            api_key: None,
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_provider() -> String { "ollama".to_string() }
fn default_orchestrator_model() -> String { "llama3.2".to_string() }
fn default_generation_timeout() -> u64 { 15 }

/// One registry entry. `endpoint` is absent only for the orchestrator itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecialistConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub specialty: String,
    /// Bind address when running this specialist's own service.
    #[serde(default)]
    pub listen: Option<String>,
}

impl SpecialistConfig {
    fn builtin(id: SpecialistId) -> Self {
        let (endpoint, model, specialty) = match id {
            SpecialistId::Math => (
                Some("http://localhost:8001"),
                "deepseek-r1",
                "mathematical problems and calculations",
            ),
            SpecialistId::Coding => (
                Some("http://localhost:8002"),
                "codellama",
                "programming and software development",
            ),
            SpecialistId::Creative => (
                Some("http://localhost:8003"),
                "vicuna",
                "creative and open-ended questions",
            ),
            SpecialistId::Orchestrator => {
                (None, "llama3.2", "general knowledge and conversation")
            }
        };
        Self {
            endpoint: endpoint.map(str::to_string),
            model: model.to_string(),
            specialty: specialty.to_string(),
            listen: None,
        }
    }

    /// Address the specialist service binds to: explicit `listen`, else the endpoint's port on all interfaces.
    pub fn listen_addr(&self) -> Option<String> {
        if let Some(listen) = &self.listen {
            return Some(listen.clone());
        }
        let endpoint = self.endpoint.as_deref()?.trim_end_matches('/');
        let port = endpoint.rsplit(':').next()?.parse::<u16>().ok()?;
        Some(format!("0.0.0.0:{}", port))
    }

    fn fill_from(&mut self, builtin: SpecialistConfig) {
        if self.endpoint.is_none() {
            self.endpoint = builtin.endpoint;
        }
        if self.model.is_empty() {
            self.model = builtin.model;
        }
        if self.specialty.is_empty() {
            self.specialty = builtin.specialty;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistsConfig {
    #[serde(rename = "agent_math", default = "default_math")]
    pub math: SpecialistConfig,
    #[serde(rename = "agent_coding", default = "default_coding")]
    pub coding: SpecialistConfig,
    #[serde(rename = "agent_creative", default = "default_creative")]
    pub creative: SpecialistConfig,
    #[serde(rename = "self", default = "default_orchestrator")]
    pub orchestrator: SpecialistConfig,
}

impl Default for SpecialistsConfig {
    fn default() -> Self {
        Self {
            math: default_math(),
            coding: default_coding(),
            creative: default_creative(),
            orchestrator: default_orchestrator(),
        }
    }
}

impl SpecialistsConfig {
    pub fn get(&self, id: SpecialistId) -> &SpecialistConfig {
        match id {
            SpecialistId::Math => &self.math,
            SpecialistId::Coding => &self.coding,
            SpecialistId::Creative => &self.creative,
            SpecialistId::Orchestrator => &self.orchestrator,
        }
    }

    fn get_mut(&mut self, id: SpecialistId) -> &mut SpecialistConfig {
        match id {
            SpecialistId::Math => &mut self.math,
            SpecialistId::Coding => &mut self.coding,
            SpecialistId::Creative => &mut self.creative,
            SpecialistId::Orchestrator => &mut self.orchestrator,
        }
    }

    /// Partially specified tables inherit the built-in values for missing fields.
    fn apply_defaults(&mut self) {
        for id in SpecialistId::ALL {
            let builtin = SpecialistConfig::builtin(id);
            let entry = self.get_mut(id);
            if id.is_remote() {
                entry.fill_from(builtin);
            } else {
                entry.endpoint = None;
                if entry.model.is_empty() {
                    entry.model = builtin.model;
                }
                if entry.specialty.is_empty() {
                    entry.specialty = builtin.specialty;
                }
            }
        }
    }
}

fn default_math() -> SpecialistConfig { SpecialistConfig::builtin(SpecialistId::Math) }
fn default_coding() -> SpecialistConfig { SpecialistConfig::builtin(SpecialistId::Coding) }
fn default_creative() -> SpecialistConfig { SpecialistConfig::builtin(SpecialistId::Creative) }
fn default_orchestrator() -> SpecialistConfig { SpecialistConfig::builtin(SpecialistId::Orchestrator) }

/// Network contract for calls to remote specialists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed pause between attempts; no backoff growth.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Retry 4xx responses too (legacy behaviour). Off by default.
    #[serde(default)]
    pub retry_client_errors: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            retry_client_errors: false,
        }
    }
}

fn default_request_timeout() -> u64 { 60 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_delay() -> u64 { 30 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_router_timeout")]
    pub timeout_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_router_timeout(),
        }
    }
}

fn default_router_timeout() -> u64 { 15 }

/// Whether specialist answers are judged and refined before concluding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    /// Route, introduce, dispatch, follow up. No judging.
    Skip,
    /// Judge every answer and refine up to `max_refine_passes` times.
    #[default]
    Refine,
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationMode::Skip => f.write_str("skip"),
            EvaluationMode::Refine => f.write_str("refine"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub evaluation: EvaluationMode,
    #[serde(default = "default_max_refine_passes")]
    pub max_refine_passes: u32,
    /// Specialist answers are cut to this many characters before judging.
    #[serde(default = "default_evaluation_truncate")]
    pub evaluation_truncate_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            evaluation: EvaluationMode::default(),
            max_refine_passes: default_max_refine_passes(),
            evaluation_truncate_chars: default_evaluation_truncate(),
        }
    }
}

fn default_max_refine_passes() -> u32 { 1 }
fn default_evaluation_truncate() -> usize { 1500 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            health_timeout_secs: default_health_timeout(),
        }
    }
}

fn default_bind() -> String { "0.0.0.0:8000".to_string() }
fn default_health_timeout() -> u64 { 3 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| SwitchboardError::ConfigNotFound(path.display().to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(content);

        let mut config: AppConfig =
            toml::from_str(&expanded).map_err(|e| SwitchboardError::Config(e.to_string()))?;
        config.specialists.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Reject values no session could run with.
    pub fn validate(&self) -> Result<()> {
        for id in SpecialistId::REMOTE {
            let endpoint = self.specialists.get(id).endpoint.as_deref().unwrap_or("");
            if endpoint.trim().is_empty() {
                return Err(SwitchboardError::MissingEndpoint {
                    specialist: id.key().to_string(),
                });
            }
        }
        if self.dispatch.request_timeout_secs == 0 {
            return Err(SwitchboardError::Config(
                "dispatch.request_timeout_secs must be positive".into(),
            ));
        }
        if self.generation.timeout_secs == 0 || self.router.timeout_secs == 0 {
            return Err(SwitchboardError::Config(
                "generation and router timeouts must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Unset variables stay verbatim
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}
