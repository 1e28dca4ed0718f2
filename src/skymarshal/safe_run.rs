//! Safe-Run Wrapper (C5): per-agent timeout and exception isolation (spec.md
//! §4.5). Never throws — always returns an [`AgentResponse`].

use std::time::{Duration, Instant};

use chrono::Utc;

use crate::skymarshal::agents::{run_agent, Agent, PeerView};
use crate::skymarshal::config::SkymarshalConfig;
use crate::skymarshal::model::{AgentResponse, AgentStatus, FlightInfo, Phase};

fn timeout_for(agent: &Agent, config: &SkymarshalConfig) -> Duration {
    if agent.name.is_safety() {
        config.safety_agent_timeout
    } else {
        config.business_agent_timeout
    }
}

/// Invokes `agent` for one phase under a timeout, converting any failure
/// into a typed, non-success `AgentResponse` rather than propagating it.
pub async fn safe_run(
    agent: &Agent,
    config: &SkymarshalConfig,
    flight_info: &FlightInfo,
    prompt: &str,
    phase: Phase,
    peers: Option<&[PeerView]>,
) -> AgentResponse {
    let started = Instant::now();
    let timeout = timeout_for(agent, config);

    let outcome = tokio::time::timeout(
        timeout,
        run_agent(agent.name, agent.llm.as_ref(), agent.tools.as_ref(), flight_info, prompt, phase, peers),
    )
    .await;

    let duration_seconds = started.elapsed().as_secs_f64();

    match outcome {
        Ok(Ok(mut response)) => {
            response.duration_seconds = duration_seconds;
            response
        }
        Ok(Err(err)) => {
            log::warn!("agent '{}' failed: {}", agent.name, err);
            AgentResponse {
                agent_name: agent.name,
                recommendation: String::new(),
                confidence: 0.0,
                reasoning: String::new(),
                binding_constraints: if agent.name.is_safety() { Some(vec![]) } else { None },
                data_sources: vec![],
                timestamp: Utc::now(),
                status: AgentStatus::Error,
                duration_seconds,
                error: Some(err.to_string()),
                extracted_flight_info: Some(flight_info.clone()),
                timeout_threshold_seconds: None,
                is_safety_critical: if agent.name.is_safety() { Some(true) } else { None },
                error_type: Some("LlmError".to_string()),
            }
        }
        Err(_elapsed) => {
            log::warn!("agent '{}' timed out after {:.1}s", agent.name, timeout.as_secs_f64());
            AgentResponse {
                agent_name: agent.name,
                recommendation: String::new(),
                confidence: 0.0,
                reasoning: String::new(),
                binding_constraints: if agent.name.is_safety() { Some(vec![]) } else { None },
                data_sources: vec![],
                timestamp: Utc::now(),
                status: AgentStatus::Timeout,
                duration_seconds,
                error: Some(format!("agent timed out after {:.1}s", timeout.as_secs_f64())),
                extracted_flight_info: Some(flight_info.clone()),
                timeout_threshold_seconds: Some(timeout.as_secs_f64()),
                is_safety_critical: if agent.name.is_safety() { Some(true) } else { None },
                error_type: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skymarshal::dal::InMemoryOperationalStore;
    use crate::skymarshal::llm::mock::ScriptedLlmClient;
    use crate::skymarshal::llm::LlmError;
    use crate::skymarshal::model::AgentName;
    use crate::skymarshal::tools::ToolRegistry;
    use std::sync::Arc;

    fn flight_info() -> FlightInfo {
        FlightInfo {
            flight_number: "EY123".to_string(),
            date: "2026-01-20".to_string(),
            disruption_event: "hydraulic fault".to_string(),
        }
    }

    #[tokio::test]
    async fn provider_error_becomes_error_status_never_panics() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Err(LlmError::Provider("boom".to_string()))]));
        let tools = Arc::new(ToolRegistry::new(Arc::new(InMemoryOperationalStore::new())));
        let agent = Agent::new(AgentName::CrewCompliance, llm, tools);
        let config = SkymarshalConfig::default();
        let response = safe_run(&agent, &config, &flight_info(), "prompt", Phase::Initial, None).await;
        assert_eq!(response.status, AgentStatus::Error);
        assert_eq!(response.confidence, 0.0);
        assert_eq!(response.is_safety_critical, Some(true));
        assert!(response.binding_constraints.is_some());
    }

    #[tokio::test]
    async fn business_agent_error_has_no_safety_flag() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Err(LlmError::Provider("boom".to_string()))]));
        let tools = Arc::new(ToolRegistry::new(Arc::new(InMemoryOperationalStore::new())));
        let agent = Agent::new(AgentName::Finance, llm, tools);
        let config = SkymarshalConfig::default();
        let response = safe_run(&agent, &config, &flight_info(), "prompt", Phase::Initial, None).await;
        assert_eq!(response.status, AgentStatus::Error);
        assert_eq!(response.is_safety_critical, None);
        assert_eq!(response.binding_constraints, None);
    }
}
