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

//! A/B experiment data model, per `spec.md` §4.4.

use hermes_prompts::PromptId;
use semver::Version;
use serde::{Deserialize, Serialize};

pub type ExperimentId = u128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentStatus {
    Draft,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl ExperimentStatus {
    /// `draft → running → (paused ↔ running) → completed`; `draft →
    /// cancelled` is allowed; `completed`/`cancelled` are terminal.
    pub fn can_transition_to(self, next: ExperimentStatus) -> bool {
        use ExperimentStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Draft, Running) => true,
            (Draft, Cancelled) => true,
            (Running, Paused) => true,
            (Paused, Running) => true,
            (Running, Completed) | (Paused, Completed) => true,
            (Running, Cancelled) | (Paused, Cancelled) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrafficSplitStrategy {
    Equal,
    Weighted,
    EpsilonGreedy { epsilon: f64 },
    Thompson,
    Ucb { c: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    Conversion,
    Value,
    Rating,
    Latency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricGoal {
    Maximize,
    Minimize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    pub name: String,
    pub metric_type: MetricType,
    pub goal: MetricGoal,
    pub minimum_detectable_effect: f64,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantStats {
    pub impressions: u64,
    pub conversions: u64,
    pub total_value: f64,
    pub total_latency: f64,
}

impl VariantStats {
    pub fn conversion_rate(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.conversions as f64 / self.impressions as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub name: String,
    pub prompt_id: PromptId,
    pub prompt_version: Version,
    pub weight: f64,
    pub is_control: bool,
    pub stats: VariantStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Impression,
    Conversion,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentEvent {
    pub experiment_id: ExperimentId,
    pub variant_id: String,
    pub user_id: String,
    pub event_type: EventType,
    pub value: f64,
    pub metric_id: Option<String>,
    pub timestamp: u64,
}

/// Verdict for one control/treatment pair, per `spec.md` §4.4's
/// "Significance" operation, generalised to N variants (`SPEC_FULL.md`
/// §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseSignificance {
    pub variant_id: String,
    pub chi_square: f64,
    pub p_value: f64,
    pub confidence: f64,
    pub lift: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Recommendation {
    PromoteWinner,
    KeepControl,
    Continue,
    InconclusiveStop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub winner_variant_id: Option<String>,
    pub pairwise: Vec<PairwiseSignificance>,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: ExperimentId,
    pub name: String,
    pub status: ExperimentStatus,
    pub variants: Vec<Variant>,
    pub metrics: Vec<Metric>,
    pub traffic_split: TrafficSplitStrategy,
    pub traffic_percentage: f64,
    pub min_sample_size: u64,
    pub max_duration_days: u32,
    pub confidence_threshold: f64,
    pub auto_promote: bool,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub winner_variant_id: Option<String>,
    pub result: Option<ExperimentResult>,
}

impl Experiment {
    pub fn control(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.is_control)
    }

    pub fn total_impressions(&self) -> u64 {
        self.variants.iter().map(|v| v.stats.impressions).sum()
    }
}
