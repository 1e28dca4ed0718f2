//! End-to-end orchestration tests driving `PhaseOrchestrator` through a
//! scripted LLM, without a live provider.

use std::sync::Arc;

use serde_json::json;
use skymarshal::skymarshal::dal::InMemoryOperationalStore;
use skymarshal::skymarshal::llm::mock::ScriptedLlmClient;
use skymarshal::skymarshal::llm::{LlmCompletion, LlmError};
use skymarshal::skymarshal::tools::ToolRegistry;
use skymarshal::{AgentName, PhaseOrchestrator, SkymarshalConfig};

fn extraction_output() -> String {
    json!({"flight_number": "EY123", "date": "2026-01-20", "disruption_event": "hydraulic fault"}).to_string()
}

fn agent_output_with_margin(margin_phrase: &str) -> String {
    json!({
        "recommendation": "Proceed with 6 hour delay",
        "confidence": 0.9,
        "reasoning": format!("Crew rest requirements satisfied with {}", margin_phrase),
        "binding_constraints": [],
        "data_sources": ["flights"],
    })
    .to_string()
}

fn safety_violation_output() -> String {
    json!({
        "recommendation": "Cannot proceed",
        "confidence": 0.4,
        "reasoning": "this plan violates crew rest rules",
        "binding_constraints": ["Crew must have 10h rest before next duty"],
        "data_sources": ["crew_roster"],
    })
    .to_string()
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
        "recommendations": ["Notify connecting passengers of the delay"],
    })
    .to_string()
}

#[tokio::test]
async fn full_pipeline_recommends_a_solution_when_every_agent_succeeds() {
    let mut responses = vec![Ok(LlmCompletion { content: extraction_output(), tool_calls: vec![] })];
    for _ in 0..14 {
        responses.push(Ok(LlmCompletion { content: agent_output_with_margin("a significant margin"), tool_calls: vec![] }));
    }
    responses.push(Ok(LlmCompletion { content: arbitration_output(), tool_calls: vec![] }));

    let llm = Arc::new(ScriptedLlmClient::new(responses));
    let tools = Arc::new(ToolRegistry::new(Arc::new(InMemoryOperationalStore::new())));
    let orchestrator = PhaseOrchestrator::new(SkymarshalConfig::default(), llm, tools);

    let result = orchestrator.run("Flight EY123 had a hydraulic fault yesterday").await.unwrap();

    assert_eq!(result.initial_collation.responses.len(), 7);
    assert_eq!(result.revised_collation.responses.len(), 7);
    assert_eq!(result.arbitrator_output.recommended_solution_id, Some("A".to_string()));
    assert!(result.arbitrator_output.recommended_solution().unwrap().composite_score > 0.0);
}

#[tokio::test]
async fn safety_agent_failure_in_phase_one_halts_before_revision() {
    let extraction = Ok(LlmCompletion { content: extraction_output(), tool_calls: vec![] });

    // Seven Phase 1 responses: crew_compliance (first in AgentName::ALL) times out by
    // returning a provider error, the rest succeed. No Phase 2 or arbitration call should
    // ever be made, so only eight scripted responses are queued in total.
    let mut responses = vec![extraction];
    responses.push(Err(LlmError::Provider("simulated outage".to_string())));
    for _ in 0..6 {
        responses.push(Ok(LlmCompletion { content: agent_output_with_margin("a comfortable margin"), tool_calls: vec![] }));
    }

    let llm = Arc::new(ScriptedLlmClient::new(responses));
    let tools = Arc::new(ToolRegistry::new(Arc::new(InMemoryOperationalStore::new())));
    let orchestrator = PhaseOrchestrator::new(SkymarshalConfig::default(), llm, tools);

    let err = orchestrator.run("Flight EY123 had a hydraulic fault").await.unwrap_err();

    match err {
        skymarshal::OrchestrationError::SafetyHalt { failed_agents } => {
            assert!(failed_agents.contains(&AgentName::CrewCompliance));
        }
        other => panic!("expected a safety halt, got {:?}", other),
    }
}

#[tokio::test]
async fn safety_override_attributes_the_blocking_agent_when_every_candidate_violates() {
    let mut responses = vec![Ok(LlmCompletion { content: extraction_output(), tool_calls: vec![] })];
    // Phase 1: crew_compliance raises a binding constraint but still succeeds.
    responses.push(Ok(LlmCompletion { content: safety_violation_output(), tool_calls: vec![] }));
    for _ in 0..6 {
        responses.push(Ok(LlmCompletion { content: agent_output_with_margin("a comfortable margin"), tool_calls: vec![] }));
    }
    // Phase 2: same seven agents again.
    responses.push(Ok(LlmCompletion { content: safety_violation_output(), tool_calls: vec![] }));
    for _ in 0..6 {
        responses.push(Ok(LlmCompletion { content: agent_output_with_margin("a comfortable margin"), tool_calls: vec![] }));
    }
    let violating_candidate = json!({
        "candidates": [{
            "solution_id": "A",
            "title": "depart on schedule",
            "safety_compliance": "this plan violates crew rest rules",
            "violates_constraints": true,
            "confidence": 0.3,
            "estimated_duration": "0h",
            "financial_impact": {"total_cost": 1000.0},
            "passenger_impact": {"affected": 40, "delay_hours": 0.0, "cancelled": false, "reprotection_options": []},
            "network_impact": {"downstream_flights": 0, "connection_misses": 0},
        }],
        "conflicts_identified": [],
        "conflict_resolutions": [],
        "final_decision": "No eligible option",
        "justification": "Only candidate violates crew rest",
        "reasoning": "impasse",
        "recommendations": [],
    })
    .to_string();
    responses.push(Ok(LlmCompletion { content: violating_candidate, tool_calls: vec![] }));

    let llm = Arc::new(ScriptedLlmClient::new(responses));
    let tools = Arc::new(ToolRegistry::new(Arc::new(InMemoryOperationalStore::new())));
    let orchestrator = PhaseOrchestrator::new(SkymarshalConfig::default(), llm, tools);

    let result = orchestrator.run("Flight EY123 had a hydraulic fault").await.unwrap();

    assert_eq!(result.arbitrator_output.recommended_solution_id, None);
    assert_eq!(result.arbitrator_output.safety_overrides.len(), 1);
    assert_eq!(result.arbitrator_output.safety_overrides[0].safety_agent, AgentName::CrewCompliance);
}
