//! Audit & Report Generator (C9): assembles a [`DecisionReport`] from an
//! [`ArbitratorOutput`] (spec.md §4.9), ported from
//! `src/agents/report_generator.py`.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::skymarshal::model::{
    ArbitratorOutput, ConflictAnalysis, ConflictResolutionSummary, DecisionReport, ImpactAssessment,
    ImpactCategory, RecoverySolution, Severity, SolutionComparison,
};

lazy_static! {
    static ref FLIGHT_NUMBER_PATTERN: Regex = Regex::new(r"\b[A-Z]{2}\d{3,4}\b").unwrap();
}

fn extract_flight_number(output: &ArbitratorOutput) -> String {
    let haystack = format!("{} {}", output.reasoning, output.justification);
    FLIGHT_NUMBER_PATTERN
        .find(&haystack)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

fn extract_disruption_type(output: &ArbitratorOutput) -> &'static str {
    let haystack = format!("{} {}", output.reasoning, output.justification).to_lowercase();
    if ["crew", "fdp", "duty"].iter().any(|kw| haystack.contains(kw)) {
        "crew"
    } else if ["maintenance", "aircraft", "mechanical"].iter().any(|kw| haystack.contains(kw)) {
        "maintenance"
    } else if haystack.contains("weather") {
        "weather"
    } else if ["regulatory", "curfew", "slot"].iter().any(|kw| haystack.contains(kw)) {
        "regulatory"
    } else {
        "other"
    }
}

fn generate_executive_summary(
    output: &ArbitratorOutput,
    flight_number: &str,
    disruption_type: &str,
) -> String {
    let mut sentences = vec![format!(
        "Flight {} experienced a {} disruption.",
        flight_number, disruption_type
    )];
    sentences.push(format!(
        "{} candidate recovery solution(s) were evaluated.",
        output.solution_options.len()
    ));
    if let Some(solution) = output.recommended_solution() {
        sentences.push(format!(
            "The recommended solution is \"{}\" with a composite score of {:.1}.",
            solution.title, solution.composite_score
        ));
    }
    sentences.push(format!("Overall confidence: {:.0}%.", output.confidence * 100.0));
    sentences.join(" ")
}

fn safety_severity(score: f64) -> Severity {
    if score >= 90.0 {
        Severity::Low
    } else if score >= 70.0 {
        Severity::Medium
    } else {
        Severity::High
    }
}

fn cost_severity(total_cost: f64) -> Severity {
    if total_cost > 150_000.0 {
        Severity::High
    } else if total_cost > 50_000.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn passenger_severity(cancelled: bool, delay_hours: f64) -> Severity {
    if cancelled {
        Severity::High
    } else if delay_hours > 4.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn network_severity(downstream_flights: u32) -> Severity {
    if downstream_flights > 5 {
        Severity::High
    } else if downstream_flights > 2 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// One impact statement per category from the recommended solution's
/// dimension data (spec.md §4.9).
fn extract_impact_assessments(solution: &RecoverySolution) -> Vec<ImpactAssessment> {
    vec![
        ImpactAssessment {
            category: ImpactCategory::Safety,
            severity: safety_severity(solution.safety_score),
            description: solution.safety_compliance.clone(),
            affected_count: 0,
            estimated_cost: 0.0,
            mitigation_steps: vec![],
        },
        ImpactAssessment {
            category: ImpactCategory::Financial,
            severity: cost_severity(solution.financial_impact.total_cost),
            description: format!("Estimated cost of ${:.0}.", solution.financial_impact.total_cost),
            affected_count: 0,
            estimated_cost: solution.financial_impact.total_cost,
            mitigation_steps: vec![],
        },
        ImpactAssessment {
            category: ImpactCategory::Passenger,
            severity: passenger_severity(solution.passenger_impact.cancelled, solution.passenger_impact.delay_hours),
            description: format!(
                "{} passengers affected, {:.1}h delay{}.",
                solution.passenger_impact.affected,
                solution.passenger_impact.delay_hours,
                if solution.passenger_impact.cancelled { ", flight cancelled" } else { "" }
            ),
            affected_count: solution.passenger_impact.affected,
            estimated_cost: 0.0,
            mitigation_steps: solution.passenger_impact.reprotection_options.clone(),
        },
        ImpactAssessment {
            category: ImpactCategory::Network,
            severity: network_severity(solution.network_impact.downstream_flights),
            description: format!(
                "{} downstream flights, {} connection misses.",
                solution.network_impact.downstream_flights, solution.network_impact.connection_misses
            ),
            affected_count: solution.network_impact.downstream_flights,
            estimated_cost: 0.0,
            mitigation_steps: vec![],
        },
    ]
}

/// Per-solution score breakdown plus pairwise trade-off sentences comparing
/// the top two solutions by composite score (spec.md §4.9).
fn generate_solution_comparison(solutions: &[RecoverySolution]) -> SolutionComparison {
    let mut scores_by_solution = HashMap::new();
    let mut ranked: Vec<&RecoverySolution> = solutions.iter().collect();
    ranked.sort_by(|a, b| b.composite_score.partial_cmp(&a.composite_score).unwrap());

    for solution in solutions {
        scores_by_solution.insert(
            solution.solution_id.clone(),
            [solution.safety_score, solution.cost_score, solution.passenger_score, solution.network_score],
        );
    }

    let mut trade_off_notes = vec![];
    if ranked.len() >= 2 {
        let (first, second) = (ranked[0], ranked[1]);
        if first.safety_score > second.safety_score && first.cost_score < second.cost_score {
            trade_off_notes.push(format!(
                "\"{}\" trades higher cost for better safety margin than \"{}\".",
                first.title, second.title
            ));
        } else if first.cost_score > second.cost_score && first.safety_score < second.safety_score {
            trade_off_notes.push(format!(
                "\"{}\" trades safety margin for lower cost than \"{}\".",
                first.title, second.title
            ));
        }
        if first.passenger_score > second.passenger_score && first.network_score < second.network_score {
            trade_off_notes.push(format!(
                "\"{}\" favors passenger experience over network impact compared to \"{}\".",
                first.title, second.title
            ));
        } else if first.network_score > second.network_score && first.passenger_score < second.passenger_score {
            trade_off_notes.push(format!(
                "\"{}\" favors network stability over passenger impact compared to \"{}\".",
                first.title, second.title
            ));
        }
    }

    SolutionComparison { scores_by_solution, trade_off_notes }
}

/// Counts by conflict type and a textual resolution summary (spec.md §4.9).
fn extract_conflict_analysis(output: &ArbitratorOutput) -> ConflictAnalysis {
    let mut counts_by_type: HashMap<String, u32> = HashMap::new();
    for conflict in &output.conflicts_identified {
        *counts_by_type.entry(conflict.conflict_type.clone()).or_insert(0) += 1;
    }
    let resolution_summary = output
        .conflict_resolutions
        .iter()
        .map(|resolution| ConflictResolutionSummary {
            conflict: resolution.conflict_description.clone(),
            resolution: resolution.resolution.clone(),
            rationale: resolution.rationale.clone(),
        })
        .collect();
    ConflictAnalysis { counts_by_type, resolution_summary }
}

fn generate_recommendations_summary(output: &ArbitratorOutput) -> Vec<String> {
    if output.recommendations.is_empty() {
        vec!["No specific recommendations provided.".to_string()]
    } else {
        output.recommendations.iter().take(5).cloned().collect()
    }
}

/// Produces a [`DecisionReport`] for one disruption from an
/// [`ArbitratorOutput`] (spec.md §4.9, C9).
pub fn generate_decision_report(output: ArbitratorOutput, disruption_id: &str) -> DecisionReport {
    let flight_number = extract_flight_number(&output);
    let disruption_type = extract_disruption_type(&output);
    let executive_summary = generate_executive_summary(&output, &flight_number, disruption_type);
    let impact_assessments = output.recommended_solution().map(extract_impact_assessments).unwrap_or_default();
    let solution_comparison = generate_solution_comparison(&output.solution_options);
    let conflict_analysis = extract_conflict_analysis(&output);
    let recommendations_summary = generate_recommendations_summary(&output);

    DecisionReport {
        report_id: DecisionReport::report_id_for(disruption_id),
        arbitrator_output: output,
        executive_summary,
        impact_assessments,
        solution_comparison,
        conflict_analysis,
        recommendations_summary,
    }
}

/// Booleans for each required section, per spec.md §4.9's completeness
/// validator. `conflict_resolutions` is always true: an orchestration with no
/// conflicts is a complete report, not an incomplete one.
#[derive(Debug, Clone, Copy)]
pub struct ReportCompleteness {
    pub executive_summary: bool,
    pub solution_options: bool,
    pub recommended_solution: bool,
    pub impact_assessments: bool,
    pub conflict_resolutions: bool,
    pub solution_comparison: bool,
    pub justification: bool,
    pub reasoning: bool,
}

pub fn validate_report_completeness(report: &DecisionReport) -> ReportCompleteness {
    ReportCompleteness {
        executive_summary: !report.executive_summary.is_empty(),
        solution_options: !report.arbitrator_output.solution_options.is_empty(),
        recommended_solution: report.arbitrator_output.recommended_solution_id.is_some(),
        impact_assessments: !report.impact_assessments.is_empty(),
        conflict_resolutions: true,
        solution_comparison: !report.solution_comparison.scores_by_solution.is_empty(),
        justification: !report.arbitrator_output.justification.is_empty(),
        reasoning: !report.arbitrator_output.reasoning.is_empty(),
    }
}
