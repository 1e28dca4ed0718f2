//! Core data model shared across the orchestrator (spec.md §3).
//!
//! Every type here is plain data; behavior lives in the owning modules
//! (`agents`, `arbitrator`, `orchestrator`, `report`).

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The seven specialist agents, partitioned into safety and business categories
/// per spec.md §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    CrewCompliance,
    Maintenance,
    Regulatory,
    Network,
    GuestExperience,
    Cargo,
    Finance,
}

impl AgentName {
    /// All seven agents, in the order they are listed in spec.md §6.4.
    pub const ALL: [AgentName; 7] = [
        AgentName::CrewCompliance,
        AgentName::Maintenance,
        AgentName::Regulatory,
        AgentName::Network,
        AgentName::GuestExperience,
        AgentName::Cargo,
        AgentName::Finance,
    ];

    /// Safety agents carry binding constraints and can trigger a safety halt.
    pub fn kind(&self) -> AgentKind {
        match self {
            AgentName::CrewCompliance | AgentName::Maintenance | AgentName::Regulatory => {
                AgentKind::Safety
            }
            AgentName::Network | AgentName::GuestExperience | AgentName::Cargo | AgentName::Finance => {
                AgentKind::Business
            }
        }
    }

    pub fn is_safety(&self) -> bool {
        self.kind() == AgentKind::Safety
    }

    /// Canonical snake_case name, matching the `serde` representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentName::CrewCompliance => "crew_compliance",
            AgentName::Maintenance => "maintenance",
            AgentName::Regulatory => "regulatory",
            AgentName::Network => "network",
            AgentName::GuestExperience => "guest_experience",
            AgentName::Cargo => "cargo",
            AgentName::Finance => "finance",
        }
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Safety agents gate eligibility via binding constraints; business agents are
/// advisory only (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Safety,
    Business,
}

/// Outcome classification applied by the safe-run wrapper (C5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Success,
    Timeout,
    Error,
}

/// Which fan-out round a Collation or AgentResponse belongs to (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initial,
    Revision,
}

/// Normalized flight identity extracted from free text by C3.
///
/// Invariant: all three fields are populated before this value is constructed —
/// enforced by `extractor::extract_flight_info`, never by a downstream consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightInfo {
    pub flight_number: String,
    /// ISO 8601 `YYYY-MM-DD`.
    pub date: String,
    pub disruption_event: String,
}

/// A single agent's typed output for one phase (spec.md §3).
///
/// Lifecycle: created once per agent per phase by C4/C5, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_name: AgentName,
    pub recommendation: String,
    pub confidence: f64,
    pub reasoning: String,
    /// Required (possibly empty) for safety agents; absent for business agents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding_constraints: Option<Vec<String>>,
    pub data_sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub status: AgentStatus,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_flight_info: Option<FlightInfo>,
    /// Set by C5 when a safety agent times out; absent otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_threshold_seconds: Option<f64>,
    /// Set by C5 whenever the response belongs to a safety agent and the
    /// status is not success (spec.md §4.5).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_safety_critical: Option<bool>,
    /// Class-name-equivalent tag recorded alongside `error` by C5.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl AgentResponse {
    pub fn is_success(&self) -> bool {
        self.status == AgentStatus::Success
    }
}

/// The complete set of seven AgentResponses produced in a single phase.
///
/// Invariant: the key set always equals the seven canonical agent names. A
/// missing agent is represented by a non-success AgentResponse, never by
/// absence from the map (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collation {
    pub phase: Phase,
    pub responses: HashMap<AgentName, AgentResponse>,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl Collation {
    pub fn filter_successful(&self) -> Vec<&AgentResponse> {
        self.responses.values().filter(|r| r.is_success()).collect()
    }

    pub fn filter_failed(&self) -> Vec<&AgentResponse> {
        self.responses.values().filter(|r| !r.is_success()).collect()
    }

    pub fn count_by_status(&self) -> HashMap<AgentStatus, usize> {
        let mut counts = HashMap::new();
        for response in self.responses.values() {
            *counts.entry(response.status).or_insert(0) += 1;
        }
        counts
    }

    /// Safety agents, in `AgentName::ALL` order, whose response is not success.
    pub fn failed_safety_agents(&self) -> Vec<AgentName> {
        AgentName::ALL
            .iter()
            .copied()
            .filter(|name| name.is_safety())
            .filter(|name| {
                self.responses
                    .get(name)
                    .map(|r| !r.is_success())
                    .unwrap_or(true)
            })
            .collect()
    }
}

/// Monetary impact of a RecoverySolution (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialImpact {
    pub total_cost: f64,
}

/// Passenger impact of a RecoverySolution (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerImpact {
    pub affected: u32,
    pub delay_hours: f64,
    pub cancelled: bool,
    pub reprotection_options: Vec<String>,
}

/// Network impact of a RecoverySolution (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkImpact {
    pub downstream_flights: u32,
    pub connection_misses: u32,
}

/// A candidate recovery option scored by the arbitrator (spec.md §3, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySolution {
    pub solution_id: String,
    pub title: String,
    pub safety_score: f64,
    pub cost_score: f64,
    pub passenger_score: f64,
    pub network_score: f64,
    /// `round(0.4*safety + 0.2*cost + 0.2*passenger + 0.2*network, 1)`.
    pub composite_score: f64,
    pub confidence: f64,
    pub estimated_duration: String,
    pub safety_compliance: String,
    pub financial_impact: FinancialImpact,
    pub passenger_impact: PassengerImpact,
    pub network_impact: NetworkImpact,
}

/// One agent disagreement and how the arbitrator resolved it (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub conflict_type: String,
    pub conflict_description: String,
    pub resolution: String,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactCategory {
    Safety,
    Passenger,
    Financial,
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One per-category impact statement in a DecisionReport (spec.md §3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAssessment {
    pub category: ImpactCategory,
    pub severity: Severity,
    pub description: String,
    pub affected_count: u32,
    pub estimated_cost: f64,
    pub mitigation_steps: Vec<String>,
}

/// A binding constraint that eliminated an otherwise-competitive candidate
/// (spec.md §4.7 point 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyOverride {
    pub safety_agent: AgentName,
    pub binding_constraint: String,
}

/// A timing mismatch, resource contention, or constraint-vs-preference
/// disagreement identified by the arbitrator (spec.md §4.7 point 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifiedConflict {
    pub conflict_type: String,
    pub description: String,
    pub agents_involved: Vec<AgentName>,
}

/// The arbitrator's final decision (spec.md §3, C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitratorOutput {
    pub recommended_solution_id: Option<String>,
    pub solution_options: Vec<RecoverySolution>,
    pub conflicts_identified: Vec<IdentifiedConflict>,
    pub conflict_resolutions: Vec<ConflictResolution>,
    pub safety_overrides: Vec<SafetyOverride>,
    pub final_decision: String,
    pub recommendations: Vec<String>,
    pub justification: String,
    pub reasoning: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl ArbitratorOutput {
    /// The recommended solution's full record, if one was selected.
    pub fn recommended_solution(&self) -> Option<&RecoverySolution> {
        let id = self.recommended_solution_id.as_ref()?;
        self.solution_options.iter().find(|s| &s.solution_id == id)
    }
}

/// Per-solution score breakdown plus trade-off sentences (C9, spec.md §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionComparison {
    pub scores_by_solution: HashMap<String, [f64; 4]>,
    pub trade_off_notes: Vec<String>,
}

/// Counts by conflict type plus a textual resolution summary (C9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictAnalysis {
    pub counts_by_type: HashMap<String, u32>,
    pub resolution_summary: Vec<ConflictResolutionSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolutionSummary {
    pub conflict: String,
    pub resolution: String,
    pub rationale: String,
}

/// The complete audit record produced by C9: the arbitrator output plus
/// derived narrative sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionReport {
    pub report_id: String,
    pub arbitrator_output: ArbitratorOutput,
    pub executive_summary: String,
    pub impact_assessments: Vec<ImpactAssessment>,
    pub solution_comparison: SolutionComparison,
    pub conflict_analysis: ConflictAnalysis,
    pub recommendations_summary: Vec<String>,
}

impl DecisionReport {
    pub fn report_id_for(disruption_id: &str) -> String {
        format!("RPT-{}", disruption_id)
    }
}

/// Lifecycle state of a persisted request record (spec.md §3, §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Processing,
    Complete,
    Error,
}

/// The persisted row representing a pending or completed orchestration
/// request (spec.md §3, §6.2). Numeric fields are fixed-point (`Decimal`) so
/// the backing store never observes floating point, per spec.md §9.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub request_id: Uuid,
    pub status: RequestStatus,
    pub prompt: String,
    pub session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Epoch-seconds expiry, `created_at + 1h`.
    pub ttl: i64,
    pub assessment: Option<DecisionReport>,
    pub execution_time_ms: Option<Decimal>,
    pub error: Option<String>,
    pub error_code: Option<String>,
}

impl RequestRecord {
    pub fn new(request_id: Uuid, prompt: String, session_id: Option<Uuid>, ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            request_id,
            status: RequestStatus::Processing,
            prompt,
            session_id,
            created_at: now,
            updated_at: now,
            ttl: now.timestamp() + ttl_seconds,
            assessment: None,
            execution_time_ms: None,
            error: None,
            error_code: None,
        }
    }
}

/// A single append-only interaction in a session's history (spec.md §3, §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    /// Milliseconds since epoch; sessions are ordered descending by this field.
    pub timestamp: i64,
    pub request_id: Uuid,
    pub prompt: String,
    pub response: Option<String>,
    pub status: RequestStatus,
    pub execution_time_ms: Option<Decimal>,
    pub error_message: Option<String>,
    /// Epoch-seconds expiry, `created + 30d`.
    pub ttl: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_name_round_trips_through_json() {
        let json = serde_json::to_string(&AgentName::CrewCompliance).unwrap();
        assert_eq!(json, "\"crew_compliance\"");
        let back: AgentName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AgentName::CrewCompliance);
    }

    #[test]
    fn safety_and_business_partition_matches_spec() {
        let safety: Vec<AgentName> = AgentName::ALL.iter().copied().filter(|a| a.is_safety()).collect();
        assert_eq!(
            safety,
            vec![AgentName::CrewCompliance, AgentName::Maintenance, AgentName::Regulatory]
        );
    }

    #[test]
    fn report_id_prefixes_disruption_id() {
        assert_eq!(DecisionReport::report_id_for("abc-123"), "RPT-abc-123");
    }
}
