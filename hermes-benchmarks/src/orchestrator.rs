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

//! The Benchmark Orchestrator (C2): drives the external evaluator, persists
//! results, computes baseline delta and regression flags, and aggregates
//! trends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hermes_core::{
    now_millis, CritiqueProvider, CritiqueRequest, CritiqueReport, Evaluator, EvaluatorRequest,
    HermesError, NotificationKind, NotificationPayload, Notifier, Result,
};
use hermes_prompts::{Prompt, PromptId, PromptStorage, PromptStore};
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::storage::BenchmarkResultStorage;
use crate::types::{standard_suites, BenchmarkResult, BenchmarkSuite, ComparisonReport, Trends};

#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Percentage drop below the trailing mean that counts as a regression.
    pub regression_pct: f64,
    /// Total attempts (including the first) against the evaluator before
    /// surfacing `Degraded`.
    pub max_attempts: u32,
    /// Bound on concurrent runs in `run_batch`.
    pub concurrency_limit: usize,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            regression_pct: 5.0,
            max_attempts: 3,
            concurrency_limit: 10,
        }
    }
}

pub struct BenchmarkOrchestrator<S: PromptStorage + ?Sized> {
    prompts: Arc<PromptStore<S>>,
    results: Arc<dyn BenchmarkResultStorage>,
    evaluator: Arc<dyn Evaluator>,
    critique: Arc<dyn CritiqueProvider>,
    notifier: Arc<dyn Notifier>,
    suites: RwLock<HashMap<String, BenchmarkSuite>>,
    config: BenchmarkConfig,
}

impl<S: PromptStorage + ?Sized + 'static> BenchmarkOrchestrator<S> {
    pub fn new(
        prompts: Arc<PromptStore<S>>,
        results: Arc<dyn BenchmarkResultStorage>,
        evaluator: Arc<dyn Evaluator>,
        critique: Arc<dyn CritiqueProvider>,
        notifier: Arc<dyn Notifier>,
        config: BenchmarkConfig,
    ) -> Self {
        let suites = standard_suites().into_iter().map(|s| (s.id.clone(), s)).collect();
        Self {
            prompts,
            results,
            evaluator,
            critique,
            notifier,
            suites: RwLock::new(suites),
            config,
        }
    }

    pub fn register_suite(&self, suite: BenchmarkSuite) {
        self.suites.write().insert(suite.id.clone(), suite);
    }

    pub fn get_suite(&self, id: &str) -> Result<BenchmarkSuite> {
        self.suites
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| HermesError::not_found(format!("benchmark suite {id}")))
    }

    async fn call_evaluator_with_retry(&self, request: EvaluatorRequest) -> Result<hermes_core::EvaluatorResponse> {
        let mut attempt = 1;
        let mut delay = Duration::from_millis(100);
        loop {
            match self.evaluator.run_benchmark(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.config.max_attempts => {
                    warn!(attempt, error = %e, "evaluator call failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(HermesError::Degraded(e.to_string())),
            }
        }
    }

    /// `runBenchmark(prompt, suiteId, modelId, executor, notify, enforceGate)`
    /// per `spec.md` §4.2.
    pub async fn run_benchmark(
        &self,
        prompt: &Prompt,
        suite_id: &str,
        model_id: &str,
        executor_id: &str,
        notify: bool,
        enforce_gate: bool,
    ) -> Result<BenchmarkResult> {
        let suite = self.get_suite(suite_id)?;
        let baseline = prompt.last_benchmark_score;

        let request = EvaluatorRequest {
            prompt_content: prompt.content.clone(),
            prompt_id: prompt.id.to_string(),
            prompt_version: prompt.version.to_string(),
            content_hash: prompt.content_hash.clone(),
            suite_id: suite.id.clone(),
            model_id: model_id.to_string(),
            dimensions: suite.dimensions.clone(),
            timeout_seconds: 60,
            gate_threshold: suite.gate_threshold,
            include_baseline: true,
        };

        let now = now_millis();
        let mut result = match self.call_evaluator_with_retry(request).await {
            Ok(response) => {
                let delta = baseline.map(|b| response.overall_score - b);
                let gate_passed = response.overall_score >= 100.0 * suite.gate_threshold;
                BenchmarkResult {
                    id: format!("bench-{:x}", rand::random::<u64>()),
                    prompt_id: prompt.id,
                    version: prompt.version.clone(),
                    content_hash: prompt.content_hash.clone(),
                    suite_id: suite.id.clone(),
                    overall_score: response.overall_score,
                    dimension_scores: response.dimension_scores,
                    model_id: model_id.to_string(),
                    model_version: response.model_version,
                    execution_time_ms: response.execution_time_ms,
                    token_usage: response.token_usage,
                    baseline_score: baseline,
                    delta,
                    gate_passed,
                    gate_threshold: suite.gate_threshold,
                    is_regression: false,
                    executed_at: now,
                    executor_id: executor_id.to_string(),
                    environment: response.environment,
                    error: response.error,
                }
            }
            Err(e) => {
                // Degraded: evaluator unreachable after retries. The result
                // is still persisted, with score 0 and the failure recorded.
                BenchmarkResult {
                    id: format!("bench-{:x}", rand::random::<u64>()),
                    prompt_id: prompt.id,
                    version: prompt.version.clone(),
                    content_hash: prompt.content_hash.clone(),
                    suite_id: suite.id.clone(),
                    overall_score: 0.0,
                    dimension_scores: HashMap::new(),
                    model_id: model_id.to_string(),
                    model_version: String::new(),
                    execution_time_ms: 0,
                    token_usage: HashMap::new(),
                    baseline_score: baseline,
                    delta: baseline.map(|b| -b),
                    gate_passed: false,
                    gate_threshold: suite.gate_threshold,
                    is_regression: false,
                    executed_at: now,
                    executor_id: executor_id.to_string(),
                    environment: "degraded".to_string(),
                    error: Some(e.to_string()),
                }
            }
        };

        // Regression detection: trailing mean over the 5 most recent
        // results, excluding simulation-tagged entries.
        let recent = self.results.recent(prompt.id, 5).await?;
        let production_recent: Vec<&BenchmarkResult> =
            recent.iter().filter(|r| r.environment != "simulation").collect();
        if !production_recent.is_empty() {
            let mu = production_recent.iter().map(|r| r.overall_score).sum::<f64>()
                / production_recent.len() as f64;
            result.is_regression = result.overall_score < mu * (1.0 - self.config.regression_pct / 100.0);
        }

        self.results.insert(result.clone()).await?;

        if let Err(e) = self.prompts.record_benchmark(prompt.id, result.overall_score, result.executed_at).await {
            warn!(prompt_id = %prompt.id, error = %e, "failed to update benchmark score cache, next run will self-correct");
        }

        if notify {
            let kind = if result.is_regression {
                NotificationKind::BenchmarkRegression
            } else {
                NotificationKind::BenchmarkComplete
            };
            let payload = NotificationPayload {
                id: format!("notif-{}", result.id),
                title: format!("Benchmark complete for prompt {}", prompt.slug),
                body: format!("overall score {:.1}", result.overall_score),
                kind,
                priority: if result.is_regression { "high" } else { "normal" }.to_string(),
                channels: vec!["default".to_string()],
                recipients: vec!["system".to_string()],
                data: serde_json::json!({ "prompt_id": prompt.id.to_string(), "score": result.overall_score }),
                link: None,
                actions: Vec::new(),
            };
            if let Err(e) = self.notifier.notify(payload).await {
                warn!(error = %e, "notification dropped");
            }
        }

        if enforce_gate && !result.gate_passed {
            return Err(HermesError::Policy(format!(
                "gate threshold not met: {:.1} < {:.1}",
                result.overall_score,
                100.0 * suite.gate_threshold
            )));
        }

        Ok(result)
    }

    /// Parallel fan-out bounded by `config.concurrency_limit`. Failures are
    /// logged and omitted from the returned vector.
    pub async fn run_batch(
        self: &Arc<Self>,
        prompts: Vec<Prompt>,
        suite_id: String,
        model_id: String,
        executor_id: String,
        notify: bool,
        parallel: bool,
    ) -> Vec<BenchmarkResult> {
        if !parallel {
            let mut out = Vec::with_capacity(prompts.len());
            for prompt in &prompts {
                match self.run_benchmark(prompt, &suite_id, &model_id, &executor_id, notify, false).await {
                    Ok(result) => out.push(result),
                    Err(e) => warn!(prompt_id = %prompt.id, error = %e, "benchmark in batch failed, omitting"),
                }
            }
            return out;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit));
        let mut handles = Vec::with_capacity(prompts.len());

        for prompt in prompts {
            let orchestrator = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let suite_id = suite_id.clone();
            let model_id = model_id.clone();
            let executor_id = executor_id.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                orchestrator
                    .run_benchmark(&prompt, &suite_id, &model_id, &executor_id, notify, false)
                    .await
            }));
        }

        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Ok(result)) => out.push(result),
                Ok(Err(e)) => warn!(error = %e, "benchmark in batch failed, omitting"),
                Err(e) => warn!(error = %e, "benchmark task panicked, omitting"),
            }
        }
        out
    }

    /// Called by C1 after any content-changing update. Disabled per-prompt
    /// via `metadata.autoBenchmark = false`.
    pub async fn trigger_auto_benchmark(
        &self,
        prompt: &Prompt,
        _change_summary: &str,
        author_id: &str,
    ) -> Result<Option<BenchmarkResult>> {
        if !prompt.auto_benchmark_enabled() {
            debug!(prompt_id = %prompt.id, "auto-benchmark disabled for prompt");
            return Ok(None);
        }
        let suite_id = prompt.kind.default_suite();
        let suite = self.get_suite(suite_id)?;
        let result = self
            .run_benchmark(prompt, suite_id, &suite.default_model, author_id, true, false)
            .await?;
        Ok(Some(result))
    }

    pub async fn history(&self, prompt_id: PromptId, limit: usize) -> Result<Vec<BenchmarkResult>> {
        self.results.recent(prompt_id, limit).await
    }

    /// `spec.md` §4.2 trends, with the exact slope/threshold formula pinned
    /// in `SPEC_FULL.md` §4.2.
    pub async fn trends(&self, prompt_id: PromptId, window_days: u32) -> Result<Trends> {
        let history = self.results.recent(prompt_id, 1000).await?; // newest first
        let now = now_millis();
        let window_ms = window_days as u64 * 86_400_000;
        let windowed: Vec<&BenchmarkResult> = history
            .iter()
            .filter(|r| now.saturating_sub(r.executed_at) <= window_ms)
            .collect();

        if windowed.is_empty() {
            return Ok(Trends {
                slope: 0.0,
                trend: "stable".to_string(),
                rolling_avg_7d: None,
                rolling_avg_30d: None,
                delta_7d: None,
                delta_30d: None,
                per_dimension_avg: HashMap::new(),
                change: 0.0,
            });
        }

        // Chronological (oldest-first) order for the regression.
        let mut chronological = windowed.clone();
        chronological.reverse();

        let n = chronological.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = chronological.iter().map(|r| r.overall_score).sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (i, r) in chronological.iter().enumerate() {
            let xi = i as f64 - x_mean;
            numerator += xi * (r.overall_score - y_mean);
            denominator += xi * xi;
        }
        let slope = if denominator == 0.0 { 0.0 } else { numerator / denominator };
        let trend = if slope > 0.5 {
            "improving"
        } else if slope < -0.5 {
            "declining"
        } else {
            "stable"
        };

        let change = windowed.first().unwrap().overall_score - windowed.last().unwrap().overall_score;

        let rolling_avg = |days: u64| -> Option<f64> {
            let ms = days * 86_400_000;
            let subset: Vec<f64> = windowed
                .iter()
                .filter(|r| now.saturating_sub(r.executed_at) <= ms)
                .map(|r| r.overall_score)
                .collect();
            if subset.is_empty() {
                None
            } else {
                Some(subset.iter().sum::<f64>() / subset.len() as f64)
            }
        };

        let rolling_avg_7d = rolling_avg(7);
        let rolling_avg_30d = rolling_avg(30);
        let latest = windowed.first().unwrap().overall_score;
        let delta_7d = rolling_avg_7d.map(|avg| latest - avg);
        let delta_30d = rolling_avg_30d.map(|avg| latest - avg);

        // Per-dimension averages over at most the 10 most recent results.
        let top = &windowed[..windowed.len().min(10)];
        let mut sums: HashMap<String, f64> = HashMap::new();
        let mut counts: HashMap<String, u32> = HashMap::new();
        for r in top {
            for (dim, score) in &r.dimension_scores {
                *sums.entry(dim.clone()).or_insert(0.0) += score;
                *counts.entry(dim.clone()).or_insert(0) += 1;
            }
        }
        let per_dimension_avg = sums
            .into_iter()
            .map(|(dim, sum)| {
                let count = counts[&dim] as f64;
                (dim, sum / count)
            })
            .collect();

        Ok(Trends {
            slope,
            trend: trend.to_string(),
            rolling_avg_7d,
            rolling_avg_30d,
            delta_7d,
            delta_30d,
            per_dimension_avg,
            change,
        })
    }

    /// `runSelfCritique(prompt)`; never mutates the prompt.
    pub async fn run_self_critique(&self, prompt: &Prompt) -> Result<CritiqueReport> {
        self.critique
            .analyze(CritiqueRequest {
                prompt_content: prompt.content.clone(),
                prompt_id: prompt.id.to_string(),
                prompt_version: prompt.version.to_string(),
                prompt_type: format!("{:?}", prompt.kind),
                analysis_depth: hermes_core::AnalysisDepth::Standard,
            })
            .await
    }

    /// Applies a suggestion's content transform; does not touch the store.
    /// Callers (C5) are responsible for persisting via C1.
    pub async fn apply_suggestion(&self, content: &str, suggestion_id: &str) -> Result<String> {
        self.critique.apply_suggestion(content, suggestion_id).await
    }

    /// `checkDeploymentReadiness` lives in `hermes-gates` (it needs a
    /// `GateReport`, which this crate does not depend on to avoid a crate
    /// cycle); see `hermes_gates::readiness`.
    ///
    /// `comparePrompts` — supplemental operation, `SPEC_FULL.md` §4.2.
    pub async fn compare_prompts(
        &self,
        prompt_a: &Prompt,
        prompt_b: &Prompt,
        suite_id: &str,
        model_id: &str,
        executor_id: &str,
    ) -> Result<ComparisonReport> {
        let result_a = self.run_benchmark(prompt_a, suite_id, model_id, executor_id, false, false).await?;
        let result_b = self.run_benchmark(prompt_b, suite_id, model_id, executor_id, false, false).await?;

        let mut dimension_deltas = HashMap::new();
        for (dim, score_a) in &result_a.dimension_scores {
            if let Some(score_b) = result_b.dimension_scores.get(dim) {
                dimension_deltas.insert(dim.clone(), score_b - score_a);
            }
        }

        Ok(ComparisonReport {
            prompt_id_a: prompt_a.id,
            prompt_id_b: prompt_b.id,
            overall_score_a: result_a.overall_score,
            overall_score_b: result_b.overall_score,
            overall_delta: result_b.overall_score - result_a.overall_score,
            dimension_deltas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hermes_core::{
        EvaluatorResponse, RecordingNotifier, SimulationCritiqueProvider,
    };
    use hermes_prompts::{CreatePromptParams, InMemoryPromptStorage, PromptKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a scripted sequence of overall scores, one per call, per the
    /// literal inputs of scenario S2.
    struct ScriptedEvaluator {
        scores: Vec<f64>,
        call: AtomicUsize,
    }

    #[async_trait]
    impl Evaluator for ScriptedEvaluator {
        async fn run_benchmark(&self, request: EvaluatorRequest) -> Result<EvaluatorResponse> {
            let i = self.call.fetch_add(1, Ordering::SeqCst);
            let overall = self.scores[i.min(self.scores.len() - 1)];
            let mut dims = HashMap::new();
            dims.insert("clarity".to_string(), overall - 2.0);
            dims.insert("safety".to_string(), overall + 8.0);
            Ok(EvaluatorResponse {
                id: format!("r{i}"),
                overall_score: overall,
                dimension_scores: dims,
                token_usage: HashMap::new(),
                model_version: request.model_id,
                execution_time_ms: 5,
                environment: "production".to_string(),
                error: None,
            })
        }
    }

    async fn setup(
        scores: Vec<f64>,
    ) -> (Arc<BenchmarkOrchestrator<InMemoryPromptStorage>>, Prompt) {
        let prompts = Arc::new(PromptStore::new(Arc::new(InMemoryPromptStorage::new())));
        let prompt = prompts
            .create(CreatePromptParams {
                slug: "t1".to_string(),
                name: "Test".to_string(),
                kind: PromptKind::InstructionSpec,
                content: "A".to_string(),
                owner_id: "u-1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let orchestrator = Arc::new(BenchmarkOrchestrator::new(
            prompts,
            Arc::new(crate::storage::InMemoryBenchmarkResultStorage::new()),
            Arc::new(ScriptedEvaluator { scores, call: AtomicUsize::new(0) }),
            Arc::new(SimulationCritiqueProvider),
            Arc::new(RecordingNotifier::new()),
            BenchmarkConfig::default(),
        ));
        (orchestrator, prompt)
    }

    // S2 — benchmark and cache.
    #[tokio::test]
    async fn s2_benchmark_and_cache() {
        let (orchestrator, prompt) = setup(vec![82.0, 70.0]).await;

        let first = orchestrator
            .run_benchmark(&prompt, "default", "aria01-d3n", "tester", false, false)
            .await
            .unwrap();
        assert_eq!(first.delta, None);
        assert!(first.gate_passed);

        let mut prompt = prompt;
        prompt.last_benchmark_score = Some(first.overall_score);

        let second = orchestrator
            .run_benchmark(&prompt, "default", "aria01-d3n", "tester", false, false)
            .await
            .unwrap();
        assert_eq!(second.baseline_score, Some(82.0));
        assert_eq!(second.delta, Some(-12.0));
        // mu of the single prior production result is 82; 70 < 82*0.95=77.9
        assert!(second.is_regression);
    }

    #[tokio::test]
    async fn unknown_suite_is_not_found() {
        let (orchestrator, prompt) = setup(vec![80.0]).await;
        let err = orchestrator
            .run_benchmark(&prompt, "no-such-suite", "m", "t", false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, HermesError::NotFound(_)));
    }

    #[tokio::test]
    async fn run_batch_omits_failures_and_keeps_successes() {
        let (orchestrator, prompt) = setup(vec![80.0, 85.0]).await;
        let mut other = prompt.clone();
        other.id = prompt.id.wrapping_add(1);

        let results = orchestrator
            .run_batch(
                vec![prompt, other],
                "default".to_string(),
                "aria01-d3n".to_string(),
                "tester".to_string(),
                false,
                true,
            )
            .await;
        assert_eq!(results.len(), 2);
    }
}
