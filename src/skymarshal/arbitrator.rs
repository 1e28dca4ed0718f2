//! Arbitrator (C7): consumes two collations, scores candidate solutions,
//! resolves conflicts, and emits the final decision (spec.md §4.7).
//!
//! Conflict identification and candidate generation are inherently a
//! judgment call over free-text agent reasoning, so the arbitrator asks the
//! LLM for structured candidates and conflicts; everything downstream of
//! that — scoring, eligibility, tie-breaking, and the recommended solution —
//! is computed deterministically here per §4.7's formulas, never delegated
//! back to the model (spec.md §8 "Scoring is a pure function of its
//! inputs").

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::skymarshal::llm::{LlmClient, LlmMessage};
use crate::skymarshal::model::{
    AgentName, ArbitratorOutput, Collation, ConflictResolution, FinancialImpact, IdentifiedConflict,
    NetworkImpact, PassengerImpact, RecoverySolution, SafetyOverride,
};
use crate::skymarshal::scoring::score_solution;

#[derive(Debug, Deserialize)]
struct RawCandidate {
    solution_id: String,
    title: String,
    safety_compliance: String,
    #[serde(default)]
    violates_constraints: bool,
    confidence: f64,
    estimated_duration: String,
    financial_impact: FinancialImpact,
    passenger_impact: PassengerImpact,
    network_impact: NetworkImpact,
}

#[derive(Debug, Deserialize)]
struct RawArbitration {
    #[serde(default)]
    candidates: Vec<RawCandidate>,
    #[serde(default)]
    conflicts_identified: Vec<IdentifiedConflict>,
    #[serde(default)]
    conflict_resolutions: Vec<ConflictResolution>,
    final_decision: String,
    justification: String,
    reasoning: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// Aggregates every binding constraint named by a safety agent in `collation`
/// (spec.md §4.7 point 1).
pub fn aggregate_binding_constraints(collation: &Collation) -> Vec<String> {
    AgentName::ALL
        .iter()
        .copied()
        .filter(|name| name.is_safety())
        .filter_map(|name| collation.responses.get(&name))
        .filter_map(|response| response.binding_constraints.as_ref())
        .flatten()
        .cloned()
        .collect()
}

/// Same as [`aggregate_binding_constraints`], but keeps the originating
/// safety agent attached — needed to attribute a [`SafetyOverride`] to the
/// agent whose constraint eliminated a candidate.
fn attributed_binding_constraints(collation: &Collation) -> Vec<(AgentName, String)> {
    AgentName::ALL
        .iter()
        .copied()
        .filter(|name| name.is_safety())
        .filter_map(|name| collation.responses.get(&name).map(|r| (name, r)))
        .filter_map(|(name, response)| response.binding_constraints.as_ref().map(|cs| (name, cs)))
        .flat_map(|(name, constraints)| constraints.iter().map(move |c| (name, c.clone())))
        .collect()
}

pub struct Arbitrator {
    llm: Option<Arc<dyn LlmClient>>,
}

impl Arbitrator {
    pub fn new() -> Self {
        Self { llm: None }
    }

    pub fn with_llm(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm: Some(llm) }
    }

    /// Consumes the revised Collation (and optionally the initial one, for an
    /// evolution summary) and emits the final decision (spec.md §4.7).
    pub async fn arbitrate(&self, revised: &Collation, initial: Option<&Collation>) -> ArbitratorOutput {
        let binding_constraints = aggregate_binding_constraints(revised);

        let raw = match &self.llm {
            Some(llm) => self.call_llm(llm.as_ref(), revised, initial, &binding_constraints).await,
            None => None,
        };

        let Some(raw) = raw else {
            return self.impasse_output("arbitration unavailable: no candidate solutions produced");
        };

        if raw.candidates.is_empty() {
            return ArbitratorOutput {
                recommended_solution_id: None,
                solution_options: vec![],
                conflicts_identified: raw.conflicts_identified,
                conflict_resolutions: raw.conflict_resolutions,
                safety_overrides: vec![],
                final_decision: raw.final_decision,
                recommendations: raw.recommendations,
                justification: raw.justification,
                reasoning: raw.reasoning,
                confidence: 0.0,
                timestamp: Utc::now(),
            };
        }

        let mut solutions: Vec<(RecoverySolution, bool)> = raw
            .candidates
            .into_iter()
            .map(|candidate| {
                let (safety, cost, passenger, network, composite) = score_solution(
                    &candidate.safety_compliance,
                    None,
                    &candidate.financial_impact,
                    &candidate.passenger_impact,
                    &candidate.network_impact,
                );
                let solution = RecoverySolution {
                    solution_id: candidate.solution_id,
                    title: candidate.title,
                    safety_score: safety,
                    cost_score: cost,
                    passenger_score: passenger,
                    network_score: network,
                    composite_score: composite,
                    confidence: candidate.confidence,
                    estimated_duration: candidate.estimated_duration,
                    safety_compliance: candidate.safety_compliance,
                    financial_impact: candidate.financial_impact,
                    passenger_impact: candidate.passenger_impact,
                    network_impact: candidate.network_impact,
                };
                (solution, candidate.violates_constraints)
            })
            .collect();

        // Deterministic tie-break order: composite desc, safety desc, cost asc
        // (lower cost score means higher cost — invert by using cost_score desc
        // since higher cost_score already means cheaper), passenger desc,
        // solution_id asc (spec.md §4.7 "Tie-break").
        solutions.sort_by(|(a, _), (b, _)| {
            b.composite_score
                .partial_cmp(&a.composite_score)
                .unwrap()
                .then(b.safety_score.partial_cmp(&a.safety_score).unwrap())
                .then(b.cost_score.partial_cmp(&a.cost_score).unwrap())
                .then(b.passenger_score.partial_cmp(&a.passenger_score).unwrap())
                .then(a.solution_id.cmp(&b.solution_id))
        });

        let winner_id = solutions.iter().find(|(_, violates)| !violates).map(|(s, _)| s.solution_id.clone());

        let attributed_constraints = attributed_binding_constraints(revised);
        let any_candidate_violates = solutions.iter().any(|(_, violates)| *violates);
        let safety_overrides: Vec<SafetyOverride> = if any_candidate_violates {
            attributed_constraints
                .iter()
                .map(|(agent, constraint)| SafetyOverride { safety_agent: *agent, binding_constraint: constraint.clone() })
                .collect()
        } else {
            vec![]
        };

        let confidence = winner_id
            .as_ref()
            .and_then(|id| solutions.iter().find(|(s, _)| &s.solution_id == id))
            .map(|(s, _)| s.confidence)
            .unwrap_or(0.0);

        let final_decision = if winner_id.is_some() {
            raw.final_decision
        } else {
            format!(
                "No eligible solution satisfies every binding constraint: {}. {}",
                binding_constraints.join("; "),
                raw.final_decision
            )
        };

        ArbitratorOutput {
            recommended_solution_id: winner_id,
            solution_options: solutions.into_iter().map(|(s, _)| s).collect(),
            conflicts_identified: raw.conflicts_identified,
            conflict_resolutions: raw.conflict_resolutions,
            safety_overrides,
            final_decision,
            recommendations: raw.recommendations,
            justification: raw.justification,
            reasoning: raw.reasoning,
            confidence,
            timestamp: Utc::now(),
        }
    }

    async fn call_llm(
        &self,
        llm: &dyn LlmClient,
        revised: &Collation,
        initial: Option<&Collation>,
        binding_constraints: &[String],
    ) -> Option<RawArbitration> {
        let revised_json = serde_json::to_string(&revised.responses).ok()?;
        let initial_json = initial.map(|c| serde_json::to_string(&c.responses).unwrap_or_default());

        let mut prompt = format!(
            "Revised agent responses: {}\nAggregated binding constraints: {:?}\n",
            revised_json, binding_constraints
        );
        if let Some(initial_json) = initial_json {
            prompt.push_str(&format!("Initial agent responses (for evolution context): {}\n", initial_json));
        }
        prompt.push_str(
            "Identify conflicts between agents, produce between zero and a few candidate recovery \
             solutions with their cost/passenger/network impact data, and explain your reasoning. \
             Respond with structured JSON.",
        );

        let messages = vec![
            LlmMessage::system(
                "You are the arbitrator reconciling seven specialist agents' recommendations for an \
                 airline disruption. Never recommend a solution that violates a binding safety \
                 constraint.",
            ),
            LlmMessage::user(prompt),
        ];

        let schema = json!({
            "type": "object",
            "properties": {
                "candidates": {"type": "array"},
                "conflicts_identified": {"type": "array"},
                "conflict_resolutions": {"type": "array"},
                "final_decision": {"type": "string"},
                "justification": {"type": "string"},
                "reasoning": {"type": "string"},
                "recommendations": {"type": "array"},
            },
            "required": ["final_decision", "justification", "reasoning"],
        });

        let completion = llm.complete(&messages, &[], Some(&schema)).await.ok()?;
        serde_json::from_str(&completion.content).ok()
    }

    fn impasse_output(&self, reason: &str) -> ArbitratorOutput {
        ArbitratorOutput {
            recommended_solution_id: None,
            solution_options: vec![],
            conflicts_identified: vec![],
            conflict_resolutions: vec![],
            safety_overrides: vec![],
            final_decision: reason.to_string(),
            recommendations: vec![],
            justification: reason.to_string(),
            reasoning: reason.to_string(),
            confidence: 0.0,
            timestamp: Utc::now(),
        }
    }
}

impl Default for Arbitrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skymarshal::llm::mock::ScriptedLlmClient;
    use crate::skymarshal::llm::LlmCompletion;
    use crate::skymarshal::model::{AgentResponse, AgentStatus, Phase};
    use serde_json::json;
    use std::collections::HashMap;

    fn collation_with_constraint(constraint: &str) -> Collation {
        let mut responses = HashMap::new();
        responses.insert(
            AgentName::CrewCompliance,
            AgentResponse {
                agent_name: AgentName::CrewCompliance,
                recommendation: "approved".to_string(),
                confidence: 0.9,
                reasoning: "within limits".to_string(),
                binding_constraints: Some(vec![constraint.to_string()]),
                data_sources: vec![],
                timestamp: Utc::now(),
                status: AgentStatus::Success,
                duration_seconds: 1.0,
                error: None,
                extracted_flight_info: None,
                timeout_threshold_seconds: None,
                is_safety_critical: None,
                error_type: None,
            },
        );
        Collation { phase: Phase::Revision, responses, timestamp: Utc::now(), duration_seconds: 1.0 }
    }

    #[tokio::test]
    async fn picks_highest_composite_eligible_candidate() {
        let body = json!({
            "candidates": [
                {
                    "solution_id": "A",
                    "title": "6h delay",
                    "safety_compliance": "satisfies crew rest with comfortable margin",
                    "violates_constraints": false,
                    "confidence": 0.8,
                    "estimated_duration": "6h",
                    "financial_impact": {"total_cost": 20000.0},
                    "passenger_impact": {"affected": 40, "delay_hours": 6.0, "cancelled": false, "reprotection_options": []},
                    "network_impact": {"downstream_flights": 1, "connection_misses": 0},
                },
                {
                    "solution_id": "B",
                    "title": "cancel flight",
                    "safety_compliance": "this plan violates crew rest rules",
                    "violates_constraints": true,
                    "confidence": 0.5,
                    "estimated_duration": "0h",
                    "financial_impact": {"total_cost": 5000.0},
                    "passenger_impact": {"affected": 40, "delay_hours": 0.0, "cancelled": true, "reprotection_options": []},
                    "network_impact": {"downstream_flights": 0, "connection_misses": 0},
                }
            ],
            "conflicts_identified": [],
            "conflict_resolutions": [],
            "final_decision": "Proceed with 6 hour delay",
            "justification": "Safest option with acceptable cost",
            "reasoning": "Delay satisfies crew rest and keeps cost manageable",
            "recommendations": [],
        });
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(LlmCompletion { content: body.to_string(), tool_calls: vec![] })]));
        let arbitrator = Arbitrator::with_llm(llm);
        let collation = collation_with_constraint("Crew must have 10h rest");

        let output = arbitrator.arbitrate(&collation, None).await;

        assert_eq!(output.recommended_solution_id, Some("A".to_string()));
        assert!(output.recommended_solution().unwrap().composite_score > 0.0);
    }

    #[tokio::test]
    async fn all_candidates_violating_yields_no_recommendation() {
        let body = json!({
            "candidates": [{
                "solution_id": "A",
                "title": "only option",
                "safety_compliance": "violates curfew",
                "violates_constraints": true,
                "confidence": 0.5,
                "estimated_duration": "1h",
                "financial_impact": {"total_cost": 1000.0},
                "passenger_impact": {"affected": 10, "delay_hours": 1.0, "cancelled": false, "reprotection_options": []},
                "network_impact": {"downstream_flights": 0, "connection_misses": 0},
            }],
            "conflicts_identified": [],
            "conflict_resolutions": [],
            "final_decision": "No eligible option",
            "justification": "All candidates violate constraints",
            "reasoning": "impasse",
            "recommendations": [],
        });
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(LlmCompletion { content: body.to_string(), tool_calls: vec![] })]));
        let arbitrator = Arbitrator::with_llm(llm);
        let collation = collation_with_constraint("Arrival must be before curfew");

        let output = arbitrator.arbitrate(&collation, None).await;

        assert_eq!(output.recommended_solution_id, None);
        assert_eq!(output.confidence, 0.0);
    }
}
