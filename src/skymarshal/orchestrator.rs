//! Phase Orchestrator (C6): the three-phase scheduler — initial fan-out,
//! revision round, arbitration — with a safety-halt short-circuit (spec.md
//! §4.6). Fan-out and barrier pattern grounded on
//! `cloudllm::council::Council::execute_parallel`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::skymarshal::agents::{build_peer_views, Agent};
use crate::skymarshal::arbitrator::Arbitrator;
use crate::skymarshal::config::SkymarshalConfig;
use crate::skymarshal::extractor::{extract_flight_info, ExtractionError};
use crate::skymarshal::llm::LlmClient;
use crate::skymarshal::model::{AgentName, AgentResponse, ArbitratorOutput, Collation, FlightInfo, Phase};
use crate::skymarshal::safe_run::safe_run;
use crate::skymarshal::tools::ToolRegistry;

/// A fatal failure of the orchestration as a whole — as opposed to a single
/// agent's non-success response, which is recorded inside a Collation.
#[derive(Debug, Clone)]
pub enum OrchestrationError {
    /// Flight-info extraction failed; orchestration never reached Phase 1.
    ExtractionFailed(ExtractionError),
    /// One or more safety agents were non-success in Phase 1 (spec.md §4.6).
    SafetyHalt { failed_agents: Vec<AgentName> },
}

impl fmt::Display for OrchestrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestrationError::ExtractionFailed(err) => write!(f, "EXTRACTION_FAILED: {}", err),
            OrchestrationError::SafetyHalt { failed_agents } => {
                let names: Vec<&str> = failed_agents.iter().map(|a| a.as_str()).collect();
                write!(f, "safety_halt: {}", names.join(", "))
            }
        }
    }
}

impl std::error::Error for OrchestrationError {}

/// The materialized result of a full, successful orchestration.
pub struct OrchestrationResult {
    pub initial_collation: Collation,
    pub revised_collation: Collation,
    pub arbitrator_output: ArbitratorOutput,
}

/// Coordinates the seven agents across the strictly-ordered three phases
/// (spec.md §4.6).
pub struct PhaseOrchestrator {
    config: SkymarshalConfig,
    llm: Arc<dyn LlmClient>,
    agents: HashMap<AgentName, Agent>,
    arbitrator: Arbitrator,
}

impl PhaseOrchestrator {
    pub fn new(config: SkymarshalConfig, llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        let agents = AgentName::ALL
            .iter()
            .copied()
            .map(|name| (name, Agent::new(name, llm.clone(), tools.clone())))
            .collect();
        let arbitrator = Arbitrator::with_llm(llm.clone());
        Self { config, llm, agents, arbitrator }
    }

    /// Runs the full pipeline for one free-text prompt: extraction, Phase 1,
    /// the safety-halt check, Phase 2, then Phase 3 arbitration.
    pub async fn run(&self, prompt: &str) -> Result<OrchestrationResult, OrchestrationError> {
        let flight_info = extract_flight_info(self.llm.as_ref(), prompt, Utc::now())
            .await
            .map_err(OrchestrationError::ExtractionFailed)?;

        let initial_collation = self.run_phase(Phase::Initial, &flight_info, prompt, None).await;

        let failed_safety_agents = initial_collation.failed_safety_agents();
        if !failed_safety_agents.is_empty() {
            log::error!(
                "safety halt: agents {:?} did not succeed in Phase 1",
                failed_safety_agents.iter().map(|a| a.as_str()).collect::<Vec<_>>()
            );
            return Err(OrchestrationError::SafetyHalt { failed_agents: failed_safety_agents });
        }

        let revised_collation =
            self.run_phase(Phase::Revision, &flight_info, prompt, Some(&initial_collation.responses)).await;

        let arbitrator_output =
            self.arbitrator.arbitrate(&revised_collation, Some(&initial_collation)).await;

        Ok(OrchestrationResult { initial_collation, revised_collation, arbitrator_output })
    }

    async fn run_phase(
        &self,
        phase: Phase,
        flight_info: &FlightInfo,
        prompt: &str,
        phase1_responses: Option<&HashMap<AgentName, AgentResponse>>,
    ) -> Collation {
        let started = Instant::now();
        log::info!("starting phase {:?}", phase);

        let mut handles = Vec::with_capacity(AgentName::ALL.len());
        for name in AgentName::ALL {
            let agent = self.agents.get(&name).expect("all seven agents registered").clone();
            let config = self.config.clone();
            let flight_info = flight_info.clone();
            let prompt = prompt.to_string();
            let peers = phase1_responses.map(|responses| build_peer_views(name, responses));

            handles.push(tokio::spawn(async move {
                let peers_ref = peers.as_deref();
                safe_run(&agent, &config, &flight_info, &prompt, phase, peers_ref).await
            }));
        }

        let mut responses = HashMap::with_capacity(AgentName::ALL.len());
        for handle in handles {
            let response = handle.await.expect("agent task panicked — safe_run must never panic");
            responses.insert(response.agent_name, response);
        }

        log::info!("phase {:?} complete in {:.2}s", phase, started.elapsed().as_secs_f64());

        Collation { phase, responses, timestamp: Utc::now(), duration_seconds: started.elapsed().as_secs_f64() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skymarshal::dal::InMemoryOperationalStore;
    use crate::skymarshal::llm::mock::ScriptedLlmClient;
    use crate::skymarshal::llm::LlmCompletion;
    use crate::skymarshal::model::AgentStatus;
    use serde_json::json;

    fn scripted_agent_output() -> String {
        json!({
            "recommendation": "Proceed with 6 hour delay",
            "confidence": 0.9,
            "reasoning": "Crew rest requirements satisfied with significant margin",
            "binding_constraints": [],
            "data_sources": ["flights"],
        })
        .to_string()
    }

    fn extraction_output() -> String {
        json!({"flight_number": "EY123", "date": "2026-01-20", "disruption_event": "hydraulic fault"}).to_string()
    }

    fn arbitration_output() -> String {
        json!({
            "candidates": [{
                "solution_id": "A",
                "title": "6h delay",
                "safety_compliance": "satisfies crew rest with comfortable margin",
                "violates_constraints": false,
                "confidence": 0.85,
                "estimated_duration": "6h",
                "financial_impact": {"total_cost": 30000.0},
                "passenger_impact": {"affected": 40, "delay_hours": 6.0, "cancelled": false, "reprotection_options": []},
                "network_impact": {"downstream_flights": 1, "connection_misses": 0},
            }],
            "conflicts_identified": [],
            "conflict_resolutions": [],
            "final_decision": "Proceed with 6 hour delay",
            "justification": "Best available option",
            "reasoning": "Delay keeps all agents within limits",
            "recommendations": [],
        })
        .to_string()
    }

    #[tokio::test]
    async fn happy_path_produces_both_collations_with_all_seven_agents() {
        // One extraction call + 7 agents * 2 phases + one arbitration call = 16.
        let mut responses = vec![Ok(LlmCompletion { content: extraction_output(), tool_calls: vec![] })];
        for _ in 0..14 {
            responses.push(Ok(LlmCompletion { content: scripted_agent_output(), tool_calls: vec![] }));
        }
        responses.push(Ok(LlmCompletion { content: arbitration_output(), tool_calls: vec![] }));
        let llm = Arc::new(ScriptedLlmClient::new(responses));
        let tools = Arc::new(ToolRegistry::new(Arc::new(InMemoryOperationalStore::new())));
        let orchestrator = PhaseOrchestrator::new(SkymarshalConfig::default(), llm, tools);

        let result = orchestrator.run("Flight EY123 had a hydraulic fault").await.unwrap();

        assert_eq!(result.initial_collation.responses.len(), 7);
        assert_eq!(result.revised_collation.responses.len(), 7);
        for name in AgentName::ALL {
            assert_eq!(result.initial_collation.responses[&name].status, AgentStatus::Success);
        }
    }
}
