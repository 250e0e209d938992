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

//! # Hermes Experiments
//!
//! The Experiment Controller (C4): deterministic traffic assignment,
//! significance testing, and auto-promotion of experiment winners into the
//! Prompt Store.

pub mod controller;
pub mod stats;
pub mod traffic;
pub mod types;

pub use controller::{ExperimentController, ExperimentStorage, InMemoryExperimentStorage};
pub use stats::{chi_squared_p_value_1df, evaluate_significance, recommend};
pub use traffic::assign_variant;
pub use types::{
    EventType, Experiment, ExperimentEvent, ExperimentId, ExperimentResult, ExperimentStatus,
    Metric, MetricGoal, MetricType, PairwiseSignificance, Recommendation, TrafficSplitStrategy,
    Variant, VariantStats,
};

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_prompts::{CreatePromptParams, InMemoryPromptStorage, OwnerKind, PromptKind, PromptStore, Visibility};
    use std::collections::HashMap;
    use std::sync::Arc;

    async fn staged_prompt(store: &PromptStore<InMemoryPromptStorage>) -> hermes_prompts::Prompt {
        let prompt = store
            .create(CreatePromptParams {
                slug: "greeter".to_string(),
                name: "Greeter".to_string(),
                kind: PromptKind::AgentSystem,
                category: None,
                tags: vec![],
                content: "Hello, {{name}}".to_string(),
                variables: HashMap::new(),
                metadata: HashMap::new(),
                owner_id: "owner-1".to_string(),
                owner_kind: OwnerKind::User,
                team_id: None,
                visibility: Visibility::Private,
            })
            .await
            .unwrap();

        store
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
            .unwrap();
        store
            .update(
                prompt.id,
                hermes_prompts::UpdatePromptParams {
                    state: Some(hermes_prompts::PromptState::Staged),
                    ..Default::default()
                },
                "stage",
                "owner-1",
            )
            .await
            .unwrap()
            .prompt
    }

    fn make_controller(
        prompts: Arc<PromptStore<InMemoryPromptStorage>>,
    ) -> ExperimentController<InMemoryPromptStorage> {
        ExperimentController::new(Arc::new(InMemoryExperimentStorage::default()), prompts)
    }

    #[tokio::test]
    async fn auto_promotion_deploys_the_winning_variant() {
        let prompts = Arc::new(PromptStore::new(Arc::new(InMemoryPromptStorage::default())));
        let prompt = staged_prompt(&prompts).await;
        let controller = make_controller(prompts.clone());

        let experiment = Experiment {
            id: 1,
            name: "greeting-tone".to_string(),
            status: ExperimentStatus::Draft,
            variants: vec![
                Variant {
                    id: "control".to_string(),
                    name: "control".to_string(),
                    prompt_id: prompt.id,
                    prompt_version: prompt.version.clone(),
                    weight: 0.5,
                    is_control: true,
                    stats: VariantStats { impressions: 1000, conversions: 100, total_value: 0.0, total_latency: 0.0 },
                },
                Variant {
                    id: "treatment".to_string(),
                    name: "treatment".to_string(),
                    prompt_id: prompt.id,
                    prompt_version: prompt.version.clone(),
                    weight: 0.5,
                    is_control: false,
                    stats: VariantStats { impressions: 1000, conversions: 150, total_value: 0.0, total_latency: 0.0 },
                },
            ],
            metrics: vec![],
            traffic_split: TrafficSplitStrategy::Equal,
            traffic_percentage: 100.0,
            min_sample_size: 1000,
            max_duration_days: 14,
            confidence_threshold: 0.95,
            auto_promote: true,
            created_at: 0,
            started_at: None,
            ended_at: None,
            winner_variant_id: None,
            result: None,
        };
        controller.create(experiment).unwrap();
        controller.start(1).unwrap();

        let finished = controller.check_and_promote(1).await.unwrap();
        assert_eq!(finished.status, ExperimentStatus::Completed);
        assert_eq!(finished.winner_variant_id.as_deref(), Some("treatment"));

        let deployed = prompts.get(prompt.id).await.unwrap();
        assert_eq!(deployed.state, hermes_prompts::PromptState::Deployed);
    }

    #[test]
    fn create_rejects_multiple_control_variants() {
        let prompts = Arc::new(PromptStore::new(Arc::new(InMemoryPromptStorage::default())));
        let controller = make_controller(prompts);
        let experiment = Experiment {
            id: 1,
            name: "bad".to_string(),
            status: ExperimentStatus::Draft,
            variants: vec![
                Variant {
                    id: "a".to_string(),
                    name: "a".to_string(),
                    prompt_id: 1,
                    prompt_version: semver::Version::new(1, 0, 0),
                    weight: 0.5,
                    is_control: true,
                    stats: VariantStats::default(),
                },
                Variant {
                    id: "b".to_string(),
                    name: "b".to_string(),
                    prompt_id: 1,
                    prompt_version: semver::Version::new(1, 0, 0),
                    weight: 0.5,
                    is_control: true,
                    stats: VariantStats::default(),
                },
            ],
            metrics: vec![],
            traffic_split: TrafficSplitStrategy::Equal,
            traffic_percentage: 100.0,
            min_sample_size: 1000,
            max_duration_days: 14,
            confidence_threshold: 0.95,
            auto_promote: false,
            created_at: 0,
            started_at: None,
            ended_at: None,
            winner_variant_id: None,
            result: None,
        };
        assert!(controller.create(experiment).is_err());
    }
}
