//! Agent Runtime (C4): seven typed agents, each running a tool-using LLM
//! loop and returning a typed [`AgentResponse`] (spec.md §4.4). The agent
//! shape (authorized tools, role prompt, response-format constraint) is
//! grounded on `cloudllm::council::Agent`; the revision heuristic is ported
//! from `src/agents/revision_logic.py`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::skymarshal::llm::{LlmClient, LlmError, LlmMessage};
use crate::skymarshal::model::{AgentName, AgentResponse, AgentStatus, FlightInfo, Phase};
use crate::skymarshal::tools::ToolRegistry;

/// One of the three revision decisions an agent reaches when given a peer
/// view in Phase 2 (spec.md §4.4). Advisory only — the agent's JSON output
/// is authoritative regardless of what this heuristic suggests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RevisionDecision {
    Revise,
    Confirm,
    Strengthen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionReason {
    NewTimingInfo,
    NewConstraints,
    SafetyConcern,
    OperationalChange,
    NoNewInfo,
    AlreadyConsidered,
    ReinforcingData,
}

/// A compact peer summary handed to an agent in Phase 2 (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerView {
    pub agent_name: AgentName,
    pub recommendation: String,
    pub confidence: f64,
    pub binding_constraints: Option<Vec<String>>,
}

const PEER_RECOMMENDATION_TRUNCATE: usize = 200;

/// Bound on tool round-trips per agent per phase, matching
/// `cloudllm::agent::Agent`'s own `max_tool_iterations` guard against a
/// provider that never stops calling tools.
const MAX_TOOL_ITERATIONS: usize = 5;

/// Builds the peer view for `for_agent` from the other six Phase-1 responses,
/// excluding any peer whose Phase-1 status was not success (spec.md §4.4,
/// §4.6 Phase 2).
pub fn build_peer_views(
    for_agent: AgentName,
    phase1_responses: &HashMap<AgentName, AgentResponse>,
) -> Vec<PeerView> {
    AgentName::ALL
        .iter()
        .copied()
        .filter(|name| *name != for_agent)
        .filter_map(|name| {
            let response = phase1_responses.get(&name)?;
            if !response.is_success() {
                return None;
            }
            let mut recommendation = response.recommendation.clone();
            if recommendation.len() > PEER_RECOMMENDATION_TRUNCATE {
                recommendation.truncate(PEER_RECOMMENDATION_TRUNCATE);
            }
            Some(PeerView {
                agent_name: name,
                recommendation,
                confidence: response.confidence,
                binding_constraints: response.binding_constraints.clone(),
            })
        })
        .collect()
}

fn domain_keywords(agent: AgentName) -> &'static [&'static str] {
    match agent {
        AgentName::CrewCompliance => &[
            "crew", "fdp", "flight duty period", "rest", "duty", "hours", "pilot", "captain",
            "first officer", "cabin crew", "fatigue", "qualification", "type rating", "recency",
            "medical certificate",
        ],
        AgentName::Maintenance => &[
            "maintenance", "aircraft", "mel", "airworthiness", "inspection", "repair", "work order",
            "technician", "defect", "serviceability", "registration", "tail number", "component",
            "system",
        ],
        AgentName::Regulatory => &[
            "regulatory", "regulation", "compliance", "curfew", "slot", "weather", "notam",
            "restriction", "authority", "permit", "easa", "gcaa", "faa", "caa", "approval",
        ],
        AgentName::Network => &[
            "network", "propagation", "connection", "rotation", "aircraft swap", "downstream",
            "upstream", "schedule", "delay impact", "ripple effect", "fleet", "utilization",
            "positioning",
        ],
        AgentName::GuestExperience => &[
            "passenger", "guest", "booking", "rebooking", "compensation", "vip", "elite",
            "frequent flyer", "baggage", "mishandled", "customer", "satisfaction",
            "service recovery",
        ],
        AgentName::Cargo => &[
            "cargo", "shipment", "freight", "cold chain", "perishable", "temperature",
            "hazardous", "dangerous goods", "loading", "weight", "balance", "commodity",
        ],
        AgentName::Finance => &[
            "cost", "revenue", "financial", "expense", "compensation", "refund",
            "rebooking cost", "operational cost", "fuel", "crew cost", "passenger revenue",
            "cargo revenue",
        ],
    }
}

const UNIVERSAL_KEYWORDS: &[&str] =
    &["delay", "hour", "hours", "time", "cannot", "must", "required", "safety", "risk", "violation"];
const TIMING_KEYWORDS: &[&str] = &["delay", "delayed", "postpone", "reschedule", "schedule change"];
const CONSTRAINT_KEYWORDS: &[&str] = &["cannot", "must", "required", "constraint", "limit", "restriction"];
const SAFETY_KEYWORDS: &[&str] = &["safety", "unsafe", "risk", "hazard", "violation", "compliance"];
const POSITIVE_AGREEMENT_KEYWORDS: &[&str] =
    &["approved", "proceed", "acceptable", "within limits", "compliant", "ok"];
const NEGATIVE_AGREEMENT_KEYWORDS: &[&str] = &[
    "cannot", "requires change", "violation", "exceeds", "insufficient", "requires crew change",
    "cannot proceed", "requires inspection", "delay required", "delay requires", "crew duty limits",
    "fdp limit", "exceeded",
];

fn check_agreement(text1: &str, text2: &str) -> bool {
    let text1_positive = POSITIVE_AGREEMENT_KEYWORDS.iter().any(|kw| text1.contains(kw));
    let text2_positive = POSITIVE_AGREEMENT_KEYWORDS.iter().any(|kw| text2.contains(kw));
    let text1_negative = NEGATIVE_AGREEMENT_KEYWORDS.iter().any(|kw| text1.contains(kw));
    let text2_negative = NEGATIVE_AGREEMENT_KEYWORDS.iter().any(|kw| text2.contains(kw));
    (text1_positive && text2_positive) || (text1_negative && text2_negative)
}

/// Advisory revision heuristic ported from `revision_logic.py`'s
/// `analyze_other_recommendations`. The agent's own LLM output is
/// authoritative; this only informs the prompt the agent is given.
pub fn analyze_peer_views(
    agent: AgentName,
    initial_recommendation: &str,
    peers: &[PeerView],
) -> (RevisionDecision, Vec<RevisionReason>, String) {
    let keywords = domain_keywords(agent);
    let mut relevant_count = 0usize;
    for peer in peers {
        let combined = peer.recommendation.to_lowercase();
        let has_domain = keywords.iter().any(|kw| combined.contains(kw));
        let has_universal = UNIVERSAL_KEYWORDS.iter().any(|kw| combined.contains(kw));
        if has_domain || has_universal {
            relevant_count += 1;
        }
    }

    let has_new_timing = peers
        .iter()
        .any(|p| TIMING_KEYWORDS.iter().any(|kw| p.recommendation.to_lowercase().contains(kw)));
    let has_new_constraints = peers
        .iter()
        .any(|p| CONSTRAINT_KEYWORDS.iter().any(|kw| p.recommendation.to_lowercase().contains(kw)));
    let has_safety_concerns = peers
        .iter()
        .any(|p| SAFETY_KEYWORDS.iter().any(|kw| p.recommendation.to_lowercase().contains(kw)));
    let initial_lower = initial_recommendation.to_lowercase();
    let has_reinforcing =
        peers.iter().any(|p| check_agreement(&initial_lower, &p.recommendation.to_lowercase()));

    if relevant_count == 0 {
        return (
            RevisionDecision::Confirm,
            vec![RevisionReason::NoNewInfo],
            format!(
                "No relevant information found in other agents' recommendations that affects {} domain.",
                agent
            ),
        );
    }

    if has_new_timing && matches!(agent, AgentName::CrewCompliance | AgentName::Maintenance | AgentName::Network) {
        return (
            RevisionDecision::Revise,
            vec![RevisionReason::NewTimingInfo],
            format!("Other agents provided new timing information that affects {} calculations.", agent),
        );
    }

    if has_new_constraints {
        return (
            RevisionDecision::Revise,
            vec![RevisionReason::NewConstraints],
            format!("Other agents identified new operational constraints affecting {} assessment.", agent),
        );
    }

    if has_safety_concerns && matches!(agent, AgentName::CrewCompliance | AgentName::Maintenance | AgentName::Regulatory) {
        return (
            RevisionDecision::Revise,
            vec![RevisionReason::SafetyConcern],
            format!("Other agents raised safety concerns requiring {} to re-evaluate.", agent),
        );
    }

    if has_reinforcing && relevant_count > 0 {
        return (
            RevisionDecision::Strengthen,
            vec![RevisionReason::ReinforcingData],
            format!(
                "Other agents' findings ({} agents) support and reinforce {} initial recommendation.",
                relevant_count, agent
            ),
        );
    }

    if relevant_count > 0 {
        return (
            RevisionDecision::Revise,
            vec![RevisionReason::OperationalChange],
            format!(
                "Other agents provided relevant operational information ({} agents) that may affect {}.",
                relevant_count, agent
            ),
        );
    }

    (
        RevisionDecision::Confirm,
        vec![RevisionReason::AlreadyConsidered],
        format!("Other agents' findings were already considered in {} initial analysis.", agent),
    )
}

#[derive(Debug, Deserialize)]
struct RawAgentOutput {
    recommendation: String,
    confidence: f64,
    reasoning: String,
    #[serde(default)]
    binding_constraints: Option<Vec<String>>,
    #[serde(default)]
    data_sources: Vec<String>,
}

fn role_prompt(agent: AgentName) -> String {
    format!(
        "You are the {} specialist agent in an airline disruption response team. \
         Use your authorized tools to gather data, then respond with structured JSON \
         giving your recommendation, confidence, reasoning, and data sources consulted.",
        agent
    )
}

fn response_schema(agent: AgentName) -> Value {
    let mut properties = serde_json::json!({
        "recommendation": {"type": "string"},
        "confidence": {"type": "number"},
        "reasoning": {"type": "string"},
        "data_sources": {"type": "array", "items": {"type": "string"}},
    });
    if agent.is_safety() {
        properties["binding_constraints"] = serde_json::json!({"type": "array", "items": {"type": "string"}});
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": ["recommendation", "confidence", "reasoning"],
    })
}

/// Runs one agent once, for one phase. Returns a best-effort `AgentResponse`
/// with `status=success`; callers (C5, `safe_run`) classify timeouts and
/// exceptions into the other statuses — this function itself may return an
/// `Err` when the LLM call fails, which `safe_run` converts.
pub async fn run_agent(
    agent: AgentName,
    llm: &dyn LlmClient,
    tools: &ToolRegistry,
    flight_info: &FlightInfo,
    prompt: &str,
    phase: Phase,
    peers: Option<&[PeerView]>,
) -> Result<AgentResponse, LlmError> {
    let mut messages = vec![LlmMessage::system(role_prompt(agent))];
    messages.push(LlmMessage::user(format!(
        "Disruption report: {}\nFlight: {} on {}. Event: {}",
        prompt, flight_info.flight_number, flight_info.date, flight_info.disruption_event
    )));

    if let (Phase::Revision, Some(peers)) = (phase, peers) {
        let (decision, _reasons, justification) = analyze_peer_views(agent, "", peers);
        let peer_summary = serde_json::to_string(peers).unwrap_or_default();
        messages.push(LlmMessage::user(format!(
            "Peer views from Phase 1: {}\nSuggested revision stance: {:?}. {}\n\
             Decide whether to REVISE, CONFIRM, or STRENGTHEN your recommendation and justify it.",
            peer_summary, decision, justification
        )));
    }

    let tool_metadata = tools.metadata_for_agent(agent);
    let tool_defs: Vec<Value> = tool_metadata
        .iter()
        .map(|m| serde_json::json!({"name": m.name, "description": m.description, "parameters": m.parameters}))
        .collect();

    let mut completion = llm.complete(&messages, &tool_defs, Some(&response_schema(agent))).await?;
    let mut tool_iteration = 0;

    while !completion.tool_calls.is_empty() {
        if tool_iteration >= MAX_TOOL_ITERATIONS {
            log::warn!("agent '{}' hit the tool-call iteration cap ({})", agent, MAX_TOOL_ITERATIONS);
            break;
        }
        tool_iteration += 1;

        for call in &completion.tool_calls {
            let result = tools.execute_tool(agent, &call.name, &call.arguments).await;
            let observation = match result {
                Ok(tool_result) => serde_json::to_string(&tool_result).unwrap_or_default(),
                Err(err) => serde_json::json!({"success": false, "error": err.to_string()}).to_string(),
            };
            messages.push(LlmMessage::tool(format!("Result of {}: {}", call.name, observation)));
        }

        completion = llm.complete(&messages, &tool_defs, Some(&response_schema(agent))).await?;
    }

    let raw: RawAgentOutput = serde_json::from_str(&completion.content)
        .map_err(|e| LlmError::Provider(format!("malformed agent output: {}", e)))?;

    let binding_constraints = if agent.is_safety() {
        Some(raw.binding_constraints.unwrap_or_default())
    } else {
        None
    };

    Ok(AgentResponse {
        agent_name: agent,
        recommendation: raw.recommendation,
        confidence: raw.confidence,
        reasoning: raw.reasoning,
        binding_constraints,
        data_sources: raw.data_sources,
        timestamp: Utc::now(),
        status: AgentStatus::Success,
        duration_seconds: 0.0,
        error: None,
        extracted_flight_info: Some(flight_info.clone()),
        timeout_threshold_seconds: None,
        is_safety_critical: None,
        error_type: None,
    })
}

/// Handle bundling everything `safe_run` needs to invoke one agent, mirroring
/// how `cloudllm::council::Agent` pairs a client with its tool registry.
#[derive(Clone)]
pub struct Agent {
    pub name: AgentName,
    pub llm: Arc<dyn LlmClient>,
    pub tools: Arc<ToolRegistry>,
}

impl Agent {
    pub fn new(name: AgentName, llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        Self { name, llm, tools }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skymarshal::dal::InMemoryOperationalStore;
    use crate::skymarshal::llm::mock::ScriptedLlmClient;
    use crate::skymarshal::llm::NativeToolCall;
    use crate::skymarshal::tools::ToolRegistry;

    fn peer(agent: AgentName, recommendation: &str) -> PeerView {
        PeerView { agent_name: agent, recommendation: recommendation.to_string(), confidence: 0.9, binding_constraints: None }
    }

    fn flight_info() -> FlightInfo {
        FlightInfo {
            flight_number: "EY123".to_string(),
            date: "2026-01-20".to_string(),
            disruption_event: "hydraulic fault".to_string(),
        }
    }

    #[tokio::test]
    async fn run_agent_executes_a_requested_tool_before_answering() {
        let tool_call = NativeToolCall {
            id: "call-1".to_string(),
            name: "get_flight".to_string(),
            arguments: serde_json::json!({"flight_number": "EY123", "date": "2026-01-20"}),
        };
        let final_answer = serde_json::json!({
            "recommendation": "Delay 4 hours",
            "confidence": 0.8,
            "reasoning": "Consulted flight data via tool call",
            "data_sources": ["get_flight"],
        })
        .to_string();

        let llm = ScriptedLlmClient::new(vec![
            Ok(LlmCompletion { content: String::new(), tool_calls: vec![tool_call] }),
            Ok(LlmCompletion { content: final_answer, tool_calls: vec![] }),
        ]);
        let tools = ToolRegistry::new(Arc::new(InMemoryOperationalStore::new()));

        let response = run_agent(
            AgentName::CrewCompliance,
            &llm,
            &tools,
            &flight_info(),
            "Flight EY123 had a hydraulic fault",
            Phase::Initial,
            None,
        )
        .await
        .unwrap();

        assert_eq!(response.recommendation, "Delay 4 hours");
        assert_eq!(response.status, AgentStatus::Success);
    }

    #[tokio::test]
    async fn run_agent_stops_after_the_tool_iteration_cap() {
        let repeated_call = NativeToolCall {
            id: "call-n".to_string(),
            name: "get_flight".to_string(),
            arguments: serde_json::json!({"flight_number": "EY123", "date": "2026-01-20"}),
        };
        let capped_answer = serde_json::json!({
            "recommendation": "Proceeding with best available data",
            "confidence": 0.5,
            "reasoning": "Reached the tool iteration cap",
            "data_sources": ["get_flight"],
        })
        .to_string();

        // MAX_TOOL_ITERATIONS tool-only completions, then a completion that still
        // asks for another tool call but also carries a usable answer — the loop
        // must break on the cap and parse that last completion's content rather
        // than making a sixth round-trip.
        let mut responses: Vec<Result<LlmCompletion, LlmError>> = (0..MAX_TOOL_ITERATIONS)
            .map(|_| Ok(LlmCompletion { content: String::new(), tool_calls: vec![repeated_call.clone()] }))
            .collect();
        responses.push(Ok(LlmCompletion { content: capped_answer, tool_calls: vec![repeated_call] }));
        let llm = ScriptedLlmClient::new(responses);
        let tools = ToolRegistry::new(Arc::new(InMemoryOperationalStore::new()));

        let response = run_agent(
            AgentName::CrewCompliance,
            &llm,
            &tools,
            &flight_info(),
            "Flight EY123 had a hydraulic fault",
            Phase::Initial,
            None,
        )
        .await
        .unwrap();

        assert_eq!(response.recommendation, "Proceeding with best available data");
    }

    #[test]
    fn no_relevant_findings_confirms() {
        let peers = vec![peer(AgentName::Cargo, "no particular impact expected")];
        let (decision, reasons, _) = analyze_peer_views(AgentName::Finance, "approved", &peers);
        assert_eq!(decision, RevisionDecision::Confirm);
        assert_eq!(reasons, vec![RevisionReason::NoNewInfo]);
    }

    #[test]
    fn timing_change_triggers_revise_for_crew_compliance() {
        let peers = vec![peer(AgentName::Maintenance, "3 hour delay needed for repair")];
        let (decision, reasons, _) = analyze_peer_views(AgentName::CrewCompliance, "approved", &peers);
        assert_eq!(decision, RevisionDecision::Revise);
        assert_eq!(reasons, vec![RevisionReason::NewTimingInfo]);
    }

    #[test]
    fn reinforcing_agreement_strengthens() {
        let peers = vec![peer(AgentName::Maintenance, "approved, within limits, safety ok")];
        let (decision, _, _) = analyze_peer_views(AgentName::CrewCompliance, "approved", &peers);
        assert_eq!(decision, RevisionDecision::Strengthen);
    }

    #[test]
    fn peer_views_exclude_non_success_phase1_responses() {
        let mut responses = HashMap::new();
        responses.insert(
            AgentName::Network,
            AgentResponse {
                agent_name: AgentName::Network,
                recommendation: "ok".to_string(),
                confidence: 0.5,
                reasoning: "r".to_string(),
                binding_constraints: None,
                data_sources: vec![],
                timestamp: Utc::now(),
                status: AgentStatus::Timeout,
                duration_seconds: 45.0,
                error: Some("timed out".to_string()),
                extracted_flight_info: None,
                timeout_threshold_seconds: Some(45.0),
                is_safety_critical: None,
                error_type: None,
            },
        );
        let views = build_peer_views(AgentName::CrewCompliance, &responses);
        assert!(views.is_empty());
    }
}
