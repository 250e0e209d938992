// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The gate pipeline: evaluates a latest benchmark result against a set of
//! gates and aggregates the per-gate outcomes into one deployability verdict.

use hermes_benchmarks::BenchmarkResult;
use hermes_core::time::{age_hours, now_millis};
use hermes_prompts::PromptId;

use crate::types::{EvaluationState, GateConfig, GateEvaluation, GateKind, GateReport};

fn evaluate_one(gate: &GateConfig, result: Option<&BenchmarkResult>, now: u64) -> GateEvaluation {
    if !gate.enabled {
        return GateEvaluation {
            gate_id: gate.id.clone(),
            state: EvaluationState::Skipped,
            message: "gate disabled".to_string(),
        };
    }

    let Some(result) = result else {
        return GateEvaluation {
            gate_id: gate.id.clone(),
            state: EvaluationState::Pending,
            message: "no benchmark result exists for this prompt".to_string(),
        };
    };

    let (state, message) = match &gate.kind {
        GateKind::ScoreThreshold { threshold } => {
            let required = threshold * 100.0;
            if result.overall_score >= required {
                (EvaluationState::Passed, format!("score {:.1} >= {:.1}", result.overall_score, required))
            } else {
                (EvaluationState::Failed, format!("score {:.1} < {:.1}", result.overall_score, required))
            }
        }
        GateKind::Regression { pct } => {
            let ok = !result.is_regression && result.delta.map(|d| d >= -*pct).unwrap_or(true);
            if ok {
                (EvaluationState::Passed, "no regression beyond threshold".to_string())
            } else {
                (
                    EvaluationState::Failed,
                    format!(
                        "regression detected (delta {:?}, threshold {:.1}%)",
                        result.delta, pct
                    ),
                )
            }
        }
        GateKind::Freshness { max_age_hours } => {
            let age = age_hours(result.executed_at, now);
            if age <= *max_age_hours {
                (EvaluationState::Passed, format!("benchmark is {:.1}h old", age))
            } else {
                (
                    EvaluationState::Warning,
                    format!("benchmark is {:.1}h old, exceeds {:.1}h", age, max_age_hours),
                )
            }
        }
        GateKind::DimensionMinimum { dimension, threshold } => {
            match result.dimension_scores.get(dimension) {
                None => (
                    EvaluationState::Skipped,
                    format!("dimension {dimension} not present in result"),
                ),
                Some(score) => {
                    let required = threshold * 100.0;
                    if *score >= required {
                        (EvaluationState::Passed, format!("{dimension} {:.1} >= {:.1}", score, required))
                    } else {
                        (EvaluationState::Failed, format!("{dimension} {:.1} < {:.1}", score, required))
                    }
                }
            }
        }
        GateKind::Custom { name, predicate } => {
            let state = predicate.evaluate(result);
            (state, format!("custom gate {name}"))
        }
    };

    GateEvaluation { gate_id: gate.id.clone(), state, message }
}

/// Aggregation rule, per `spec.md` §4.3: any blocking failure wins outright;
/// otherwise any failure (non-blocking) or warning downgrades to a
/// deployable warning; an all-enabled-pending set stays pending; anything
/// else passes.
fn aggregate(gates: &[GateConfig], evaluations: &[GateEvaluation]) -> (EvaluationState, bool) {
    let enabled: Vec<&GateEvaluation> = evaluations
        .iter()
        .zip(gates.iter())
        .filter(|(_, g)| g.enabled)
        .map(|(e, _)| e)
        .collect();

    if enabled.is_empty() {
        return (EvaluationState::Passed, true);
    }

    let blocking_failed = evaluations.iter().zip(gates.iter()).any(|(e, g)| {
        g.enabled && g.blocking && e.state == EvaluationState::Failed
    });
    if blocking_failed {
        return (EvaluationState::Failed, false);
    }

    let any_failed = enabled.iter().any(|e| e.state == EvaluationState::Failed);
    if any_failed {
        return (EvaluationState::Warning, true);
    }

    let any_warning = enabled.iter().any(|e| e.state == EvaluationState::Warning);
    if any_warning {
        return (EvaluationState::Warning, true);
    }

    let all_pending = enabled.iter().all(|e| e.state == EvaluationState::Pending);
    if all_pending {
        return (EvaluationState::Pending, false);
    }

    (EvaluationState::Passed, true)
}

fn summarize(evaluations: &[GateEvaluation]) -> String {
    let failed = evaluations.iter().filter(|e| e.state == EvaluationState::Failed).count();
    let warned = evaluations.iter().filter(|e| e.state == EvaluationState::Warning).count();
    let pending = evaluations.iter().filter(|e| e.state == EvaluationState::Pending).count();
    format!("{failed} failed, {warned} warnings, {pending} pending out of {} gates", evaluations.len())
}

/// Runs every gate in `gates` against `result` (the latest benchmark for the
/// prompt, if any) and returns the aggregate report. Pure and synchronous;
/// callers decide whether to persist it.
pub fn evaluate_gates(
    prompt_id: PromptId,
    version: semver::Version,
    result: Option<&BenchmarkResult>,
    gates: &[GateConfig],
) -> GateReport {
    let now = now_millis();
    let evaluations: Vec<GateEvaluation> =
        gates.iter().map(|g| evaluate_one(g, result, now)).collect();
    let (overall, can_deploy) = aggregate(gates, &evaluations);
    let summary = summarize(&evaluations);
    GateReport { prompt_id, version, overall, can_deploy, evaluations, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn result_with(overall: f64, safety: f64, age_hours_ago: u64) -> BenchmarkResult {
        BenchmarkResult {
            id: "result-1".to_string(),
            prompt_id: 1,
            version: semver::Version::new(1, 0, 0),
            content_hash: "deadbeef".to_string(),
            suite_id: "default".to_string(),
            overall_score: overall,
            dimension_scores: HashMap::from([("safety".to_string(), safety)]),
            model_id: "aria01-d3n".to_string(),
            model_version: "d3n".to_string(),
            execution_time_ms: 120,
            token_usage: HashMap::new(),
            baseline_score: None,
            delta: None,
            gate_passed: overall >= 80.0,
            gate_threshold: 80.0,
            is_regression: false,
            executed_at: now_millis().saturating_sub(age_hours_ago * 3_600_000),
            executor_id: "test".to_string(),
            environment: "production".to_string(),
            error: None,
        }
    }

    /// Scenario S3: a stale, low-safety result against the default gate set
    /// is rejected outright, with both blocking failures surfaced.
    #[test]
    fn s3_blocking_failures_reject_deployment() {
        let gates = crate::types::default_gates();
        let result = result_with(65.0, 0.70, 2);
        let report = evaluate_gates(1, semver::Version::new(1, 0, 0), Some(&result), &gates);

        assert_eq!(report.overall, EvaluationState::Failed);
        assert!(!report.can_deploy);
        let failed: Vec<_> = report
            .evaluations
            .iter()
            .filter(|e| e.state == EvaluationState::Failed)
            .collect();
        assert_eq!(failed.len(), 2);
    }

    #[test]
    fn passing_result_with_no_gates_configured_passes() {
        let result = result_with(95.0, 0.95, 1);
        let report = evaluate_gates(1, semver::Version::new(1, 0, 0), Some(&result), &[]);
        assert_eq!(report.overall, EvaluationState::Passed);
        assert!(report.can_deploy);
    }

    #[test]
    fn missing_benchmark_is_pending_not_failed() {
        let gates = crate::types::default_gates();
        let report = evaluate_gates(1, semver::Version::new(1, 0, 0), None, &gates);
        assert_eq!(report.overall, EvaluationState::Pending);
        assert!(!report.can_deploy);
    }

    #[test]
    fn stale_but_otherwise_good_result_is_non_blocking_warning() {
        let gates = crate::types::default_gates();
        let result = result_with(95.0, 0.95, 48);
        let report = evaluate_gates(1, semver::Version::new(1, 0, 0), Some(&result), &gates);
        assert_eq!(report.overall, EvaluationState::Warning);
        assert!(report.can_deploy);
    }

    #[test]
    fn absent_dimension_is_skipped_not_failed() {
        let gate = GateConfig {
            id: "perf-minimum".to_string(),
            kind: GateKind::DimensionMinimum { dimension: "performance".to_string(), threshold: 0.8 },
            enabled: true,
            blocking: true,
        };
        let result = result_with(90.0, 0.90, 1);
        let report = evaluate_gates(1, semver::Version::new(1, 0, 0), Some(&result), &[gate]);
        assert_eq!(report.evaluations[0].state, EvaluationState::Skipped);
        assert_eq!(report.overall, EvaluationState::Passed);
    }
}
