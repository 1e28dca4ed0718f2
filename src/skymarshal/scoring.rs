//! Deterministic scoring rules for candidate recovery solutions (spec.md
//! §4.7), ported exactly from `src/agents/scoring.py`.

use crate::skymarshal::model::{FinancialImpact, NetworkImpact, PassengerImpact, RecoverySolution};

const VIOLATION_KEYWORDS: &[&str] = &["violates", "cannot proceed", "non-compliant", "exceeds limit"];

/// Infers a safety margin from language cues when no explicit numeric margin
/// is given (spec.md §4.7).
fn infer_margin_from_text(text: &str) -> f64 {
    let lower = text.to_lowercase();
    if lower.contains("significant margin") {
        0.25
    } else if lower.contains("comfortable margin") {
        0.15
    } else if lower.contains("minimal margin") {
        0.05
    } else if lower.contains("satisfies") || lower.contains("compliant") {
        0.10
    } else {
        0.0
    }
}

fn margin_to_score(margin: f64) -> f64 {
    if margin >= 0.20 {
        100.0
    } else if margin >= 0.10 {
        80.0 + (margin - 0.10) / 0.10 * 20.0
    } else if margin >= 0.0 {
        60.0 + margin / 0.10 * 20.0
    } else {
        0.0
    }
}

/// Safety score: 0 if any binding constraint is violated (by explicit flag
/// or by a violation keyword in `safety_compliance`); otherwise margin-based.
pub fn calculate_safety_score(safety_compliance: &str, explicit_margin: Option<f64>) -> f64 {
    let lower = safety_compliance.to_lowercase();
    if VIOLATION_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return 0.0;
    }
    let margin = explicit_margin.unwrap_or_else(|| infer_margin_from_text(safety_compliance));
    margin_to_score(margin)
}

/// Cost score: inverse of total cost in USD (spec.md §4.7).
pub fn calculate_cost_score(total_cost: f64) -> f64 {
    if total_cost < 10_000.0 {
        100.0
    } else if total_cost < 50_000.0 {
        80.0 + (50_000.0 - total_cost) / 40_000.0 * 20.0
    } else if total_cost < 150_000.0 {
        60.0 + (150_000.0 - total_cost) / 100_000.0 * 20.0
    } else if total_cost < 300_000.0 {
        40.0 + (300_000.0 - total_cost) / 150_000.0 * 20.0
    } else {
        (40.0 - 40.0 * (total_cost - 300_000.0) / 300_000.0).max(0.0)
    }
}

/// Passenger score: base by affected count, minus delay and cancellation
/// penalties, plus a small credit for reprotection options (spec.md §4.7).
pub fn calculate_passenger_score(impact: &PassengerImpact) -> f64 {
    let base = if impact.affected < 50 {
        100.0
    } else if impact.affected < 150 {
        80.0
    } else if impact.affected < 300 {
        60.0
    } else {
        40.0
    };
    let mut score = base - (5.0 * impact.delay_hours).min(30.0);
    if impact.cancelled {
        score -= 20.0;
    }
    score += (3.0 * impact.reprotection_options.len() as f64).min(10.0);
    score.clamp(0.0, 100.0)
}

/// Network score: base by downstream flight count, minus connection-miss
/// penalty (spec.md §4.7).
pub fn calculate_network_score(impact: &NetworkImpact) -> f64 {
    let base = match impact.downstream_flights {
        0 => 100.0,
        1..=2 => 80.0,
        3..=5 => 60.0,
        _ => 40.0,
    };
    let score = base - (10.0 * impact.connection_misses as f64).min(30.0);
    score.clamp(0.0, 100.0)
}

/// Weighted composite: `0.4*safety + 0.2*cost + 0.2*passenger + 0.2*network`,
/// rounded to one decimal place (spec.md §4.7).
pub fn calculate_composite_score(safety: f64, cost: f64, passenger: f64, network: f64) -> f64 {
    let raw = 0.4 * safety + 0.2 * cost + 0.2 * passenger + 0.2 * network;
    (raw * 10.0).round() / 10.0
}

/// Scores all four dimensions of a candidate solution and writes the
/// composite back into it, matching the Python `score_solution` entry point.
pub fn score_solution(
    safety_compliance: &str,
    explicit_safety_margin: Option<f64>,
    financial_impact: &FinancialImpact,
    passenger_impact: &PassengerImpact,
    network_impact: &NetworkImpact,
) -> (f64, f64, f64, f64, f64) {
    let safety = calculate_safety_score(safety_compliance, explicit_safety_margin);
    let cost = calculate_cost_score(financial_impact.total_cost);
    let passenger = calculate_passenger_score(passenger_impact);
    let network = calculate_network_score(network_impact);
    let composite = calculate_composite_score(safety, cost, passenger, network);
    (safety, cost, passenger, network, composite)
}

/// Recomputes and overwrites `solution`'s scores in place.
pub fn rescore(solution: &mut RecoverySolution) {
    let (safety, cost, passenger, network, composite) = score_solution(
        &solution.safety_compliance,
        None,
        &solution.financial_impact,
        &solution.passenger_impact,
        &solution.network_impact,
    );
    solution.safety_score = safety;
    solution.cost_score = cost;
    solution.passenger_score = passenger;
    solution.network_score = network;
    solution.composite_score = composite;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_at_300k_is_strictly_below_40() {
        assert!(calculate_cost_score(300_000.0) < 40.0);
    }

    #[test]
    fn passenger_score_matches_spec_example() {
        let impact = PassengerImpact { affected: 150, delay_hours: 10.0, cancelled: false, reprotection_options: vec![] };
        assert_eq!(calculate_passenger_score(&impact), 30.0);
    }

    #[test]
    fn cost_and_network_match_spec_example() {
        assert!((calculate_cost_score(75_000.0) - 75.0).abs() < 0.01);
        let impact = NetworkImpact { downstream_flights: 2, connection_misses: 5 };
        assert_eq!(calculate_network_score(&impact), 50.0);
    }

    #[test]
    fn composite_matches_spec_example() {
        assert_eq!(calculate_composite_score(80.0, 65.0, 30.0, 80.0), 67.0);
    }

    #[test]
    fn violation_keyword_zeroes_safety_score() {
        assert_eq!(calculate_safety_score("this plan violates crew rest rules", None), 0.0);
    }

    #[test]
    fn margin_language_cues_map_to_expected_scores() {
        assert_eq!(margin_to_score(0.25), 100.0);
        assert_eq!(calculate_safety_score("operates with a significant margin", None), 100.0);
        assert_eq!(calculate_safety_score("operates with a minimal margin", None), margin_to_score(0.05));
    }
}
