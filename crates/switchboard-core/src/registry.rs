use crate::config::SpecialistsConfig;
use crate::error::{Result, SwitchboardError};
use crate::types::SpecialistId;

/// A registered specialist: where it lives and what it is good at.
#[derive(Debug, Clone)]
pub struct AgentEntry {
    pub id: SpecialistId,
    pub endpoint: Option<String>,
    pub model: String,
    pub specialty: String,
}

/// Immutable specialist table, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    // Indexed by `slot`; always holds every SpecialistId.
    entries: Vec<AgentEntry>,
}

fn slot(id: SpecialistId) -> usize {
    match id {
        SpecialistId::Math => 0,
        SpecialistId::Coding => 1,
        SpecialistId::Creative => 2,
        SpecialistId::Orchestrator => 3,
    }
}

impl AgentRegistry {
    pub fn from_config(config: &SpecialistsConfig) -> Self {
        let entries = SpecialistId::ALL
            .iter()
            .map(|&id| {
                let sc = config.get(id);
                AgentEntry {
                    id,
                    endpoint: if id.is_remote() {
                        sc.endpoint
                            .as_ref()
                            .map(|e| e.trim_end_matches('/').to_string())
                    } else {
                        None
                    },
                    model: sc.model.clone(),
                    specialty: sc.specialty.clone(),
                }
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, id: SpecialistId) -> &AgentEntry {
        &self.entries[slot(id)]
    }

    pub fn specialty(&self, id: SpecialistId) -> &str {
        &self.get(id).specialty
    }

    /// Base URL of a remote specialist.
    pub fn endpoint(&self, id: SpecialistId) -> Result<&str> {
        self.get(id)
            .endpoint
            .as_deref()
            .ok_or_else(|| SwitchboardError::MissingEndpoint {
                specialist: id.key().to_string(),
            })
    }

    /// Remote specialists in routing priority order.
    pub fn remote(&self) -> impl Iterator<Item = &AgentEntry> {
        SpecialistId::REMOTE.iter().map(move |&id| self.get(id))
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::from_config(&SpecialistsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_holds_every_specialist() {
        let registry = AgentRegistry::default();
        for id in SpecialistId::ALL {
            assert_eq!(registry.get(id).id, id);
            assert!(!registry.specialty(id).is_empty());
        }
    }

    #[test]
    fn test_orchestrator_has_no_endpoint() {
        let registry = AgentRegistry::default();
        assert!(registry.endpoint(SpecialistId::Orchestrator).is_err());
        assert_eq!(
            registry.endpoint(SpecialistId::Math).unwrap(),
            "http://localhost:8001"
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let mut config = SpecialistsConfig::default();
        config.coding.endpoint = Some("http://coder:8002/".into());
        let registry = AgentRegistry::from_config(&config);
        assert_eq!(registry.endpoint(SpecialistId::Coding).unwrap(), "http://coder:8002");
    }

    #[test]
    fn test_remote_order_is_routing_priority() {
        let registry = AgentRegistry::default();
        let ids: Vec<_> = registry.remote().map(|e| e.id).collect();
        assert_eq!(
            ids,
            vec![SpecialistId::Math, SpecialistId::Coding, SpecialistId::Creative]
        );
    }
}
