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

//! Quality-gate data model: tagged gate kinds, per-gate evaluation states,
//! and the aggregate report.

use std::sync::Arc;

use hermes_benchmarks::BenchmarkResult;

/// Per-gate evaluation outcome, per `spec.md` §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    Passed,
    Failed,
    Warning,
    Pending,
    Skipped,
}

/// A pluggable predicate for `GateKind::Custom`. Implementations decide
/// their own pass/fail/warning semantics from the latest benchmark result.
pub trait CustomGatePredicate: Send + Sync {
    fn evaluate(&self, result: &BenchmarkResult) -> EvaluationState;
}

/// Replaces the source's duck-typed gate configuration dictionaries with a
/// tagged sum type, per `spec.md` §9.
#[derive(Clone)]
pub enum GateKind {
    ScoreThreshold { threshold: f64 },
    Regression { pct: f64 },
    Freshness { max_age_hours: f64 },
    DimensionMinimum { dimension: String, threshold: f64 },
    Custom { name: String, predicate: Arc<dyn CustomGatePredicate> },
}

#[derive(Clone)]
pub struct GateConfig {
    pub id: String,
    pub kind: GateKind,
    pub enabled: bool,
    pub blocking: bool,
}

/// The four gates a fresh `GateConfig` collection starts with, mirroring
/// `quality_gates.py`'s `DEFAULT_GATES` (`SPEC_FULL.md` §4.3).
pub fn default_gates() -> Vec<GateConfig> {
    vec![
        GateConfig {
            id: "score-minimum".to_string(),
            kind: GateKind::ScoreThreshold { threshold: 0.80 },
            enabled: true,
            blocking: true,
        },
        GateConfig {
            id: "regression-check".to_string(),
            kind: GateKind::Regression { pct: 5.0 },
            enabled: true,
            blocking: true,
        },
        GateConfig {
            id: "benchmark-freshness".to_string(),
            kind: GateKind::Freshness { max_age_hours: 24.0 },
            enabled: true,
            blocking: false,
        },
        GateConfig {
            id: "safety-minimum".to_string(),
            kind: GateKind::DimensionMinimum { dimension: "safety".to_string(), threshold: 0.85 },
            enabled: true,
            blocking: true,
        },
    ]
}

#[derive(Debug, Clone)]
pub struct GateEvaluation {
    pub gate_id: String,
    pub state: EvaluationState,
    pub message: String,
}

/// Pure function of its inputs; never persisted by this crate, though
/// callers may choose to (`spec.md` §4.3).
#[derive(Debug, Clone)]
pub struct GateReport {
    pub prompt_id: hermes_prompts::PromptId,
    pub version: semver::Version,
    pub overall: EvaluationState,
    pub can_deploy: bool,
    pub evaluations: Vec<GateEvaluation>,
    pub summary: String,
}
