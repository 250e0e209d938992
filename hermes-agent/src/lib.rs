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

//! # Hermes Agent
//!
//! The Improvement Agent (C5): a periodic control loop that discovers,
//! prioritizes, and executes quality-improvement tasks across the prompt
//! catalog, applying suggestions only when they demonstrably help.

pub mod agent;
pub mod types;

pub use agent::ImprovementAgent;
pub use types::{
    AgentConfig, AgentMetrics, AgentState, AgentStatus, AgentTask, Priority, TaskContext, TaskType,
};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hermes_benchmarks::{BenchmarkConfig, BenchmarkOrchestrator, InMemoryBenchmarkResultStorage};
    use hermes_core::{
        CritiqueProvider, CritiqueRequest, CritiqueReport, Evaluator, EvaluatorRequest,
        EvaluatorResponse, RecordingNotifier, Result as HResult, Severity, Suggestion,
    };
    use hermes_experiments::{ExperimentController, InMemoryExperimentStorage};
    use hermes_prompts::{
        CreatePromptParams, InMemoryPromptStorage, OwnerKind, PromptKind, PromptStore, Visibility,
    };
    use hermes_gates::default_gates;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Returns a queued sequence of overall scores, one per call, so tests
    /// can script "the new version scored 78" vs "the new version scored 73"
    /// without depending on content-derived simulation scores.
    struct ScriptedEvaluator {
        scores: SyncMutex<std::collections::VecDeque<f64>>,
    }

    impl ScriptedEvaluator {
        fn new(scores: Vec<f64>) -> Self {
            Self { scores: SyncMutex::new(scores.into_iter().collect()) }
        }
    }

    #[async_trait]
    impl Evaluator for ScriptedEvaluator {
        async fn run_benchmark(&self, request: EvaluatorRequest) -> HResult<EvaluatorResponse> {
            let overall = self.scores.lock().pop_front().unwrap_or(50.0);
            let dimension_scores = request.dimensions.iter().map(|d| (d.clone(), overall)).collect();
            Ok(EvaluatorResponse {
                id: format!("scripted-{}", request.content_hash),
                overall_score: overall,
                dimension_scores,
                token_usage: HashMap::new(),
                model_version: "scripted".to_string(),
                execution_time_ms: 1,
                environment: "test".to_string(),
                error: None,
            })
        }
    }

    /// Offers exactly one high-confidence suggestion and applies it by
    /// appending a fixed marker to the content.
    struct OneSuggestionCritique;

    #[async_trait]
    impl CritiqueProvider for OneSuggestionCritique {
        async fn analyze(&self, _request: CritiqueRequest) -> HResult<CritiqueReport> {
            Ok(CritiqueReport {
                assessment: "one improvement available".to_string(),
                quality_score: 75.0,
                suggestions: vec![Suggestion {
                    id: "sugg-1".to_string(),
                    category: "clarity".to_string(),
                    severity: Severity::High,
                    description: "add an explicit instruction".to_string(),
                    suggested_change: "append a clarifying sentence".to_string(),
                    confidence: 0.95,
                    estimated_impact: 8.0,
                }],
                knowledge_gaps: vec![],
                overconfidence_areas: vec![],
                training_data_needs: vec![],
            })
        }

        async fn apply_suggestion(&self, content: &str, suggestion_id: &str) -> HResult<String> {
            if suggestion_id != "sugg-1" {
                return Err(hermes_core::HermesError::not_found("unknown suggestion"));
            }
            Ok(format!("{content}\nBe precise and concise."))
        }
    }

    async fn seed_prompt(prompts: &PromptStore<InMemoryPromptStorage>) -> hermes_prompts::Prompt {
        let prompt = prompts
            .create(CreatePromptParams {
                slug: "assistant-intro".to_string(),
                name: "Assistant Intro".to_string(),
                kind: PromptKind::AgentSystem,
                category: None,
                tags: vec![],
                content: "You are a helpful assistant.".to_string(),
                variables: HashMap::new(),
                metadata: HashMap::new(),
                owner_id: "owner-1".to_string(),
                owner_kind: OwnerKind::User,
                team_id: None,
                visibility: Visibility::Private,
            })
            .await
            .unwrap();

        prompts
            .update(
                prompt.id,
                hermes_prompts::UpdatePromptParams {
                    state: Some(hermes_prompts::PromptState::Review),
                    ..Default::default()
                },
                "move to review",
                "owner-1",
            )
            .await
            .unwrap()
            .prompt
    }

    fn make_agent(
        scores: Vec<f64>,
    ) -> (Arc<PromptStore<InMemoryPromptStorage>>, Arc<ImprovementAgent<InMemoryPromptStorage>>) {
        let prompts = Arc::new(PromptStore::new(Arc::new(InMemoryPromptStorage::default())));
        let benchmarks = Arc::new(BenchmarkOrchestrator::new(
            prompts.clone(),
            Arc::new(InMemoryBenchmarkResultStorage::default()),
            Arc::new(ScriptedEvaluator::new(scores)),
            Arc::new(OneSuggestionCritique),
            Arc::new(RecordingNotifier::new()),
            BenchmarkConfig::default(),
        ));
        let experiments = Arc::new(ExperimentController::new(
            Arc::new(InMemoryExperimentStorage::default()),
            prompts.clone(),
        ));
        let notifier = Arc::new(RecordingNotifier::new());
        let agent = Arc::new(ImprovementAgent::new(prompts.clone(), benchmarks, experiments, notifier));
        (prompts, agent)
    }

    #[tokio::test]
    async fn s6_suggestion_kept_when_new_score_improves() {
        let (prompts, agent) = make_agent(vec![78.0]);
        let prompt = seed_prompt(&prompts).await;

        let applied = agent.apply_suggestion_safely(&prompt, "sugg-1", "apply suggestion").await.unwrap();
        assert!(applied);

        let updated = prompts.get(prompt.id).await.unwrap();
        assert!(updated.content.contains("Be precise and concise."));
        assert_eq!(updated.version.patch, prompt.version.patch + 1);
    }

    #[tokio::test]
    async fn s6_suggestion_rolled_back_when_new_score_regresses() {
        let (prompts, agent) = make_agent(vec![73.0]);
        let mut prompt = seed_prompt(&prompts).await;
        prompt.last_benchmark_score = Some(75.0);
        let original_version = prompt.version.clone();

        let applied = agent.apply_suggestion_safely(&prompt, "sugg-1", "apply suggestion").await.unwrap();
        assert!(!applied);

        let rolled_back = prompts.get(prompt.id).await.unwrap();
        assert_eq!(rolled_back.content, prompt.content);
        assert_ne!(rolled_back.version, original_version);
    }

    #[tokio::test]
    async fn status_reports_default_config_before_first_cycle() {
        let (_prompts, agent) = make_agent(vec![]);
        let status = agent.status();
        assert_eq!(status.state, AgentState::Idle);
        assert!(!status.running);
        assert_eq!(status.config.max_concurrent_tasks, 5);
    }

    #[test]
    fn update_config_ignores_unknown_keys() {
        let (_prompts, agent) = {
            let prompts = Arc::new(PromptStore::new(Arc::new(InMemoryPromptStorage::default())));
            let benchmarks = Arc::new(BenchmarkOrchestrator::new(
                prompts.clone(),
                Arc::new(InMemoryBenchmarkResultStorage::default()),
                Arc::new(ScriptedEvaluator::new(vec![])),
                Arc::new(OneSuggestionCritique),
                Arc::new(RecordingNotifier::new()),
                BenchmarkConfig::default(),
            ));
            let experiments = Arc::new(ExperimentController::new(
                Arc::new(InMemoryExperimentStorage::default()),
                prompts.clone(),
            ));
            (prompts.clone(), Arc::new(ImprovementAgent::new(prompts, benchmarks, experiments, Arc::new(RecordingNotifier::new()))))
        };

        let mut updates = serde_json::Map::new();
        updates.insert("max_concurrent_tasks".to_string(), serde_json::json!(9));
        updates.insert("made_up_field".to_string(), serde_json::json!(true));
        agent.update_config(&updates);

        assert_eq!(agent.status().config.max_concurrent_tasks, 9);
        let _ = default_gates();
    }
}
