use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use switchboard_core::registry::{AgentEntry, AgentRegistry};
use switchboard_core::types::SpecialistId;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProbeResult {
    pub reachable: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub reachable: bool,
    pub model: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// "healthy" when every specialist answered, "degraded" otherwise.
    pub status: &'static str,
    pub timestamp: String,
    pub agents: BTreeMap<&'static str, ProbeResult>,
    pub orchestrator: OrchestratorStatus,
}

/// Probes each remote specialist's `GET /` concurrently.
pub struct HealthProber {
    http: reqwest::Client,
    registry: Arc<AgentRegistry>,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(registry: Arc<AgentRegistry>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            registry,
            timeout,
        }
    }

    pub async fn report(&self) -> HealthReport {
        let probes = self.registry.remote().map(|entry| async move {
            (entry.id.key(), self.probe(entry).await)
        });
        let agents: BTreeMap<_, _> = futures::future::join_all(probes).await.into_iter().collect();

        let status = if agents.values().all(|p| p.reachable) {
            "healthy"
        } else {
            "degraded"
        };

        HealthReport {
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            agents,
            orchestrator: OrchestratorStatus {
                reachable: true,
                model: self.registry.get(SpecialistId::Orchestrator).model.clone(),
            },
        }
    }

    async fn probe(&self, entry: &AgentEntry) -> ProbeResult {
        let Some(endpoint) = entry.endpoint.as_deref() else {
            return ProbeResult {
                reachable: false,
                detail: "no endpoint configured".to_string(),
            };
        };

        let url = format!("{}/", endpoint);
        let result = self.http.get(&url).timeout(self.timeout).send().await;
        let probe = match result {
            Ok(resp) if resp.status() == StatusCode::OK => ProbeResult {
                reachable: true,
                detail: "online".to_string(),
            },
            Ok(resp) => ProbeResult {
                reachable: false,
                detail: format!("HTTP {}", resp.status().as_u16()),
            },
            Err(e) if e.is_timeout() => ProbeResult {
                reachable: false,
                detail: "timed out".to_string(),
            },
            Err(e) => ProbeResult {
                reachable: false,
                detail: e.to_string(),
            },
        };
        debug!(specialist = %entry.id, reachable = probe.reachable, "Health probe");
        probe
    }
}
