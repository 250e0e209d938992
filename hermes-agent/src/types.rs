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

//! Agent data model: lifecycle state, task queue entries, metrics, and
//! runtime-mutable configuration, per `spec.md` §4.5.

use hermes_experiments::Experiment;
use hermes_prompts::{Prompt, PromptId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Idle,
    Monitoring,
    Analyzing,
    Improving,
    Sleeping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    QualityCheck,
    BenchmarkStale,
    RegressionFix,
    ProactiveOptimize,
    ApplySuggestion,
    RunExperiment,
    CrossPromptLearn,
}

/// Declaration order doubles as rank: `critical < high < medium < low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// What a task needs to run, replacing the source's untyped `context: dict`.
#[derive(Debug, Clone)]
pub enum TaskContext {
    None,
    Prompt(Box<Prompt>),
    PromptAndSuggestion { prompt: Box<Prompt>, suggestion_id: String },
    Experiment(Box<Experiment>),
}

#[derive(Debug, Clone)]
pub struct AgentTask {
    pub id: u128,
    pub task_type: TaskType,
    pub priority: Priority,
    pub prompt_id: Option<PromptId>,
    pub description: String,
    pub context: TaskContext,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub improvements_made: u64,
    pub regressions_fixed: u64,
    pub total_score_improvement: f64,
    pub last_cycle_at: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub auto_fix_regressions: bool,
    pub auto_apply_high_confidence: bool,
    pub high_confidence_threshold: f64,
    pub stale_benchmark_hours: f64,
    pub min_improvement_threshold: f64,
    pub learning_enabled: bool,
    pub cycle_interval_minutes: u64,
    pub max_concurrent_tasks: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            auto_fix_regressions: true,
            auto_apply_high_confidence: true,
            high_confidence_threshold: 0.9,
            stale_benchmark_hours: 24.0,
            min_improvement_threshold: 2.0,
            learning_enabled: true,
            cycle_interval_minutes: 15,
            max_concurrent_tasks: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub state: AgentState,
    pub running: bool,
    pub started_at: Option<u64>,
    pub uptime_seconds: f64,
    pub metrics: AgentMetrics,
    pub queue_pending: usize,
    pub queue_active: usize,
    pub config: AgentConfig,
}
