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

//! Benchmark data model: suites (configuration) and results (immutable
//! records of one evaluation run).

use std::collections::HashMap;

use hermes_prompts::PromptId;
use semver::Version;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: Option<String>,
    pub expected_patterns: Vec<String>,
    pub weight: f64,
    pub category: Option<String>,
}

/// A configuration entity for a family of benchmark runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSuite {
    pub id: String,
    pub dimensions: Vec<String>,
    pub weights: HashMap<String, f64>,
    pub gate_threshold: f64,
    pub default_model: String,
    pub tags: Vec<String>,
    pub test_cases: Vec<TestCase>,
}

impl BenchmarkSuite {
    /// `overall = Σ weight_i * score_i / Σ weight_i` per `spec.md` §3.
    pub fn overall(&self, dimension_scores: &HashMap<String, f64>) -> f64 {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for dim in &self.dimensions {
            let weight = *self.weights.get(dim).unwrap_or(&0.0);
            let score = *dimension_scores.get(dim).unwrap_or(&0.0);
            weighted_sum += weight * score;
            weight_total += weight;
        }
        if weight_total <= 0.0 {
            0.0
        } else {
            weighted_sum / weight_total
        }
    }
}

/// The five standard suites the core always makes available, per `spec.md`
/// §6. Callers may register additional suites; these are a convenience
/// starting set, not a hardcoded pipeline.
pub fn standard_suites() -> Vec<BenchmarkSuite> {
    fn suite(id: &str, dims: &[&str], gate_threshold: f64) -> BenchmarkSuite {
        let weight = 1.0 / dims.len() as f64;
        BenchmarkSuite {
            id: id.to_string(),
            dimensions: dims.iter().map(|d| d.to_string()).collect(),
            weights: dims.iter().map(|d| (d.to_string(), weight)).collect(),
            gate_threshold,
            default_model: "aria01-d3n".to_string(),
            tags: vec![id.to_string()],
            test_cases: Vec::new(),
        }
    }

    vec![
        suite("default", &["clarity", "correctness", "safety"], 0.80),
        suite("safety", &["safety", "toxicity", "bias"], 0.85),
        suite("performance", &["latency", "cost", "efficiency"], 0.70),
        suite("quality", &["clarity", "specificity", "actionability", "correctness"], 0.80),
        suite("agent", &["tool_correctness", "task_completion", "safety"], 0.80),
    ]
}

/// An immutable record of one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub id: String,
    pub prompt_id: PromptId,
    pub version: Version,
    pub content_hash: String,
    pub suite_id: String,
    pub overall_score: f64,
    pub dimension_scores: HashMap<String, f64>,
    pub model_id: String,
    pub model_version: String,
    pub execution_time_ms: u64,
    pub token_usage: HashMap<String, u64>,
    pub baseline_score: Option<f64>,
    pub delta: Option<f64>,
    pub gate_passed: bool,
    pub gate_threshold: f64,
    pub is_regression: bool,
    pub executed_at: u64,
    pub executor_id: String,
    pub environment: String,
    pub error: Option<String>,
}

/// A comparison between two prompts' benchmark performance, produced by
/// `comparePrompts` (`SPEC_FULL.md` §4.2 supplemental operation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub prompt_id_a: PromptId,
    pub prompt_id_b: PromptId,
    pub overall_score_a: f64,
    pub overall_score_b: f64,
    pub overall_delta: f64,
    pub dimension_deltas: HashMap<String, f64>,
}

/// Result of `trends` (`spec.md` §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trends {
    pub slope: f64,
    pub trend: String,
    pub rolling_avg_7d: Option<f64>,
    pub rolling_avg_30d: Option<f64>,
    pub delta_7d: Option<f64>,
    pub delta_30d: Option<f64>,
    pub per_dimension_avg: HashMap<String, f64>,
    pub change: f64,
}
