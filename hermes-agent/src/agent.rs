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

//! The Improvement Agent (C5): a periodic discover -> prioritise -> execute
//! -> sleep control loop, per `spec.md` §4.5.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hermes_benchmarks::BenchmarkOrchestrator;
use hermes_core::{now_millis, HermesError, Notifier, Result};
use hermes_experiments::ExperimentController;
use hermes_gates::{default_gates, evaluate_gates, GateConfig};
use hermes_prompts::{ListFilter, Paging, Prompt, PromptStorage, PromptStore};
use parking_lot::RwLock as SyncRwLock;
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

use crate::types::{
    AgentConfig, AgentMetrics, AgentState, AgentStatus, AgentTask, Priority, TaskContext, TaskType,
};

pub struct ImprovementAgent<S: PromptStorage + ?Sized> {
    prompts: Arc<PromptStore<S>>,
    benchmarks: Arc<BenchmarkOrchestrator<S>>,
    experiments: Arc<ExperimentController<S>>,
    notifier: Arc<dyn Notifier>,
    gates: Vec<GateConfig>,

    state: SyncRwLock<AgentState>,
    running: AtomicBool,
    started_at: SyncRwLock<Option<u64>>,
    config: SyncRwLock<AgentConfig>,
    metrics: SyncRwLock<AgentMetrics>,
    queue: Mutex<Vec<AgentTask>>,
    active_count: std::sync::atomic::AtomicUsize,
}

impl<S: PromptStorage + ?Sized + 'static> ImprovementAgent<S> {
    pub fn new(
        prompts: Arc<PromptStore<S>>,
        benchmarks: Arc<BenchmarkOrchestrator<S>>,
        experiments: Arc<ExperimentController<S>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            prompts,
            benchmarks,
            experiments,
            notifier,
            gates: default_gates(),
            state: SyncRwLock::new(AgentState::Idle),
            running: AtomicBool::new(false),
            started_at: SyncRwLock::new(None),
            config: SyncRwLock::new(AgentConfig::default()),
            metrics: SyncRwLock::new(AgentMetrics::default()),
            queue: Mutex::new(Vec::new()),
            active_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn status(&self) -> AgentStatus {
        let started_at = *self.started_at.read();
        let uptime_seconds = started_at.map(|s| (now_millis().saturating_sub(s)) as f64 / 1000.0).unwrap_or(0.0);
        AgentStatus {
            state: *self.state.read(),
            running: self.running.load(Ordering::SeqCst),
            started_at,
            uptime_seconds,
            metrics: self.metrics.read().clone(),
            queue_pending: 0,
            queue_active: self.active_count.load(Ordering::SeqCst),
            config: self.config.read().clone(),
        }
    }

    /// Applies a partial map of known config keys, ignoring unknown keys —
    /// matches `update_config` in the original source (`SPEC_FULL.md` §4.5).
    pub fn update_config(&self, updates: &serde_json::Map<String, serde_json::Value>) {
        let mut config = self.config.write();
        macro_rules! apply_f64 {
            ($key:literal, $field:ident) => {
                if let Some(v) = updates.get($key).and_then(|v| v.as_f64()) {
                    config.$field = v;
                }
            };
        }
        macro_rules! apply_bool {
            ($key:literal, $field:ident) => {
                if let Some(v) = updates.get($key).and_then(|v| v.as_bool()) {
                    config.$field = v;
                }
            };
        }
        apply_bool!("auto_fix_regressions", auto_fix_regressions);
        apply_bool!("auto_apply_high_confidence", auto_apply_high_confidence);
        apply_f64!("high_confidence_threshold", high_confidence_threshold);
        apply_f64!("stale_benchmark_hours", stale_benchmark_hours);
        apply_f64!("min_improvement_threshold", min_improvement_threshold);
        apply_bool!("learning_enabled", learning_enabled);
        if let Some(v) = updates.get("cycle_interval_minutes").and_then(|v| v.as_u64()) {
            config.cycle_interval_minutes = v;
        }
        if let Some(v) = updates.get("max_concurrent_tasks").and_then(|v| v.as_u64()) {
            config.max_concurrent_tasks = v as usize;
        }
    }

    pub async fn run_forever(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("agent already running");
            return;
        }
        *self.started_at.write() = Some(now_millis());
        *self.state.write() = AgentState::Monitoring;
        info!("improvement agent started");

        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.run_cycle().await {
                warn!(error = %e, "agent cycle failed");
            }
            *self.state.write() = AgentState::Sleeping;
            let minutes = self.config.read().cycle_interval_minutes;
            tokio::time::sleep(std::time::Duration::from_secs(minutes * 60)).await;
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        *self.state.write() = AgentState::Idle;
    }

    /// One discover -> prioritise -> execute pass. Public so callers can
    /// drive cycles explicitly (e.g. in tests) instead of via `run_forever`.
    pub async fn run_cycle(self: &Arc<Self>) -> Result<()> {
        *self.state.write() = AgentState::Monitoring;
        self.discover_tasks().await?;

        *self.state.write() = AgentState::Analyzing;
        self.prioritize_tasks().await;

        *self.state.write() = AgentState::Improving;
        self.execute_tasks().await;

        self.metrics.write().last_cycle_at = Some(now_millis());
        Ok(())
    }

    async fn discover_tasks(&self) -> Result<()> {
        let config = self.config.read().clone();
        let page = self.prompts.list(ListFilter::default(), Paging { offset: 0, limit: 1000 }).await?;

        let mut queue = self.queue.lock().await;
        for prompt in &page.items {
            let needs_benchmark = prompt
                .last_benchmark_at
                .map(|at| hermes_core::age_hours(at, now_millis()) > config.stale_benchmark_hours)
                .unwrap_or(true);
            if needs_benchmark {
                add_task(
                    &mut queue,
                    TaskType::BenchmarkStale,
                    Priority::Low,
                    prompt,
                    format!("benchmark stale for {}", prompt.name),
                    TaskContext::Prompt(Box::new(prompt.clone())),
                );
            }

            if self.has_regression(prompt).await {
                add_task(
                    &mut queue,
                    TaskType::RegressionFix,
                    Priority::Critical,
                    prompt,
                    format!("regression detected in {}", prompt.name),
                    TaskContext::Prompt(Box::new(prompt.clone())),
                );
            } else if prompt.last_benchmark_score.map(|s| s < 90.0).unwrap_or(false) {
                add_task(
                    &mut queue,
                    TaskType::ProactiveOptimize,
                    Priority::Medium,
                    prompt,
                    format!("optimization opportunity for {}", prompt.name),
                    TaskContext::Prompt(Box::new(prompt.clone())),
                );
            }
        }
        Ok(())
    }

    async fn has_regression(&self, prompt: &Prompt) -> bool {
        match self.benchmarks.history(prompt.id, 1).await {
            Ok(history) => history.first().map(|r| r.is_regression).unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn prioritize_tasks(&self) {
        let mut queue = self.queue.lock().await;
        queue.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
    }

    async fn execute_tasks(self: &Arc<Self>) {
        let max = self.config.read().max_concurrent_tasks;
        let semaphore = Arc::new(Semaphore::new(max));
        let mut handles = Vec::new();

        loop {
            let task = {
                let mut queue = self.queue.lock().await;
                if queue.is_empty() {
                    break;
                }
                queue.remove(0)
            };

            let agent = Arc::clone(self);
            let permit = Arc::clone(&semaphore).acquire_owned().await.expect("semaphore not closed");
            self.active_count.fetch_add(1, Ordering::SeqCst);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = agent.execute_task(task).await;
                agent.active_count.fetch_sub(1, Ordering::SeqCst);
                outcome
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(Ok(())) => self.metrics.write().tasks_completed += 1,
                Ok(Err(e)) => {
                    warn!(error = %e, "task execution failed");
                    self.metrics.write().tasks_failed += 1;
                }
                Err(e) => {
                    warn!(error = %e, "task panicked");
                    self.metrics.write().tasks_failed += 1;
                }
            }
        }
    }

    async fn execute_task(self: Arc<Self>, mut task: AgentTask) -> Result<()> {
        task.started_at = Some(now_millis());
        let result = match task.task_type {
            TaskType::QualityCheck => self.task_quality_check(&task).await,
            TaskType::BenchmarkStale => self.task_benchmark_stale(&task).await,
            TaskType::RegressionFix => self.task_regression_fix(&task).await,
            TaskType::ProactiveOptimize => self.task_proactive_optimize(&task).await,
            TaskType::ApplySuggestion => self.task_apply_suggestion(&task).await,
            TaskType::RunExperiment => self.task_run_experiment(&task).await,
            TaskType::CrossPromptLearn => self.task_cross_prompt_learn().await,
        };
        result.map(|_| ())
    }

    fn prompt_from(&self, task: &AgentTask) -> Result<Prompt> {
        match &task.context {
            TaskContext::Prompt(p) => Ok((**p).clone()),
            TaskContext::PromptAndSuggestion { prompt, .. } => Ok((**prompt).clone()),
            _ => Err(HermesError::invalid("task has no prompt context")),
        }
    }

    async fn task_quality_check(&self, task: &AgentTask) -> Result<serde_json::Value> {
        let prompt = self.prompt_from(task)?;
        let suite = prompt.kind.default_suite();
        let model = self.benchmarks.get_suite(suite)?.default_model;
        let result = self.benchmarks.run_benchmark(&prompt, suite, &model, "agent", false, false).await?;
        let report = evaluate_gates(prompt.id, prompt.version.clone(), Some(&result), &self.gates);
        Ok(serde_json::json!({ "status": "checked", "score": result.overall_score, "can_deploy": report.can_deploy }))
    }

    async fn task_benchmark_stale(&self, task: &AgentTask) -> Result<serde_json::Value> {
        let prompt = self.prompt_from(task)?;
        let suite = prompt.kind.default_suite();
        let model = self.benchmarks.get_suite(suite)?.default_model;
        let result = self.benchmarks.run_benchmark(&prompt, suite, &model, "agent", true, false).await?;
        Ok(serde_json::json!({ "status": "benchmarked", "score": result.overall_score, "gate_passed": result.gate_passed }))
    }

    async fn task_regression_fix(&self, task: &AgentTask) -> Result<serde_json::Value> {
        let prompt = self.prompt_from(task)?;
        if !self.config.read().auto_fix_regressions {
            return Ok(serde_json::json!({ "status": "auto_fix_disabled" }));
        }

        let critique = self.benchmarks.run_self_critique(&prompt).await?;
        let threshold = self.config.read().high_confidence_threshold;
        let best = critique
            .suggestions
            .iter()
            .filter(|s| s.confidence >= threshold)
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal));

        let Some(best) = best else {
            return self.attempt_rollback(&prompt).await;
        };

        let applied = self.apply_suggestion_safely(&prompt, &best.id, "autonomous regression fix").await?;
        if applied {
            let mut metrics = self.metrics.write();
            metrics.regressions_fixed += 1;
            metrics.improvements_made += 1;
        }
        Ok(serde_json::json!({ "status": if applied { "fixed" } else { "fix_failed" }, "suggestion_applied": best.id }))
    }

    async fn attempt_rollback(&self, prompt: &Prompt) -> Result<serde_json::Value> {
        let mut versions = self.prompts.list_versions(prompt.id).await?;
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        versions.truncate(5);
        for version in versions.iter().skip(1) {
            if let Ok(history) = self.benchmarks.history(prompt.id, 20).await {
                let version_score = history
                    .iter()
                    .find(|r| r.prompt_id == prompt.id && version.content_hash == r.content_hash)
                    .map(|r| r.overall_score);
                if let Some(score) = version_score {
                    if prompt.last_benchmark_score.map(|current| score > current).unwrap_or(true) {
                        self.prompts.rollback(prompt.id, &version.version, "hermes-agent").await?;
                        return Ok(serde_json::json!({ "status": "rolled_back", "to_version": version.version.to_string() }));
                    }
                }
            }
        }
        Ok(serde_json::json!({ "status": "no_better_version" }))
    }

    async fn task_proactive_optimize(&self, task: &AgentTask) -> Result<serde_json::Value> {
        let prompt = self.prompt_from(task)?;
        let critique = self.benchmarks.run_self_critique(&prompt).await?;
        if critique.suggestions.is_empty() {
            return Ok(serde_json::json!({ "status": "no_suggestions" }));
        }

        let (auto_apply, threshold) = {
            let config = self.config.read();
            (config.auto_apply_high_confidence, config.high_confidence_threshold)
        };

        if auto_apply {
            let best = critique
                .suggestions
                .iter()
                .filter(|s| s.confidence >= threshold)
                .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal));
            if let Some(best) = best {
                let applied = self.apply_suggestion_safely(&prompt, &best.id, "autonomous proactive optimization").await?;
                if applied {
                    self.metrics.write().improvements_made += 1;
                    return Ok(serde_json::json!({ "status": "improved", "suggestion_applied": best.id }));
                }
            }
        }

        let payload = hermes_core::NotificationPayload {
            id: format!("suggestions-{}", prompt.id),
            title: format!("Suggestions ready for {}", prompt.name),
            body: format!("{} suggestions available", critique.suggestions.len()),
            kind: hermes_core::NotificationKind::SuggestionReady,
            priority: "low".to_string(),
            channels: vec!["system".to_string()],
            recipients: vec!["system".to_string()],
            data: serde_json::json!({ "improvement_potential": critique.improvement_potential() }),
            link: None,
            actions: vec![],
        };
        let _ = self.notifier.notify(payload).await;
        Ok(serde_json::json!({ "status": "suggestions_available", "count": critique.suggestions.len() }))
    }

    async fn task_apply_suggestion(&self, task: &AgentTask) -> Result<serde_json::Value> {
        let TaskContext::PromptAndSuggestion { prompt, suggestion_id } = &task.context else {
            return Ok(serde_json::json!({ "status": "missing_context" }));
        };
        let applied = self.apply_suggestion_safely(prompt, suggestion_id, "autonomous suggestion application").await?;
        if applied {
            self.metrics.write().improvements_made += 1;
        }
        Ok(serde_json::json!({ "status": if applied { "applied" } else { "failed" } }))
    }

    async fn task_run_experiment(&self, task: &AgentTask) -> Result<serde_json::Value> {
        let TaskContext::Experiment(experiment) = &task.context else {
            return Ok(serde_json::json!({ "status": "no_experiment_config" }));
        };
        let id = experiment.id;
        self.experiments.create((**experiment).clone())?;
        self.experiments.start(id)?;
        Ok(serde_json::json!({ "status": "experiment_started", "experiment_id": id.to_string() }))
    }

    async fn task_cross_prompt_learn(&self) -> Result<serde_json::Value> {
        if !self.config.read().learning_enabled {
            return Ok(serde_json::json!({ "status": "learning_disabled" }));
        }
        let page = self.prompts.list(ListFilter::default(), Paging { offset: 0, limit: 1000 }).await?;
        let mut top: Vec<&Prompt> = page.items.iter().filter(|p| p.last_benchmark_score.unwrap_or(0.0) >= 90.0).collect();
        top.sort_by(|a, b| b.last_benchmark_score.partial_cmp(&a.last_benchmark_score).unwrap_or(std::cmp::Ordering::Equal));
        top.truncate(10);

        let mut patterns = std::collections::HashSet::new();
        for prompt in &top {
            let lower = prompt.content.to_lowercase();
            if lower.contains("example") {
                patterns.insert("uses_examples");
            }
            if lower.contains("step") {
                patterns.insert("uses_steps");
            }
        }
        Ok(serde_json::json!({ "status": "learned", "patterns": patterns.into_iter().collect::<Vec<_>>() }))
    }

    /// Safe suggestion application, per `spec.md` §4.5: apply, re-benchmark,
    /// keep only if the overall score improved, else roll back.
    pub(crate) async fn apply_suggestion_safely(&self, prompt: &Prompt, suggestion_id: &str, change_reason: &str) -> Result<bool> {
        let previous_score = prompt.last_benchmark_score.unwrap_or(0.0);
        let previous_version = prompt.version.clone();

        let new_content = self.benchmarks.apply_suggestion(&prompt.content, suggestion_id).await?;
        let outcome = self
            .prompts
            .update(
                prompt.id,
                hermes_prompts::UpdatePromptParams { content: Some(new_content), ..Default::default() },
                change_reason,
                "hermes-agent",
            )
            .await?;

        let updated = outcome.prompt;
        let Some(result) = self.benchmarks.trigger_auto_benchmark(&updated, change_reason, "hermes-agent").await? else {
            warn!(prompt_id = %prompt.id, "auto-benchmark disabled for prompt, keeping suggestion unverified");
            return Ok(true);
        };

        if result.overall_score > previous_score {
            self.metrics.write().total_score_improvement += result.overall_score - previous_score;
            Ok(true)
        } else {
            warn!(prompt_id = %prompt.id, previous_score, new_score = result.overall_score, "suggestion did not improve score, rolling back");
            self.prompts.rollback(prompt.id, &previous_version, "hermes-agent").await?;
            Ok(false)
        }
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }
}

fn add_task(
    queue: &mut Vec<AgentTask>,
    task_type: TaskType,
    priority: Priority,
    prompt: &Prompt,
    description: String,
    context: TaskContext,
) {
    if queue.iter().any(|t| t.task_type == task_type && t.prompt_id == Some(prompt.id)) {
        return;
    }
    queue.push(AgentTask {
        id: rand::random::<u128>(),
        task_type,
        priority,
        prompt_id: Some(prompt.id),
        description,
        context,
        created_at: now_millis(),
        started_at: None,
        completed_at: None,
        result: None,
        error: None,
    });
}
