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

//! The Experiment Controller (C4): lifecycle management, event recording,
//! and the auto-promotion loop into the Prompt Store.

use std::collections::HashMap;
use std::sync::Arc;

use hermes_core::{now_millis, HermesError, Result};
use hermes_prompts::{PromptState, PromptStorage, PromptStore, UpdatePromptParams};
use parking_lot::RwLock;

use crate::stats::{evaluate_significance, recommend};
use crate::traffic::assign_variant;
use crate::types::{
    Experiment, ExperimentEvent, ExperimentId, ExperimentResult, ExperimentStatus, EventType,
    Recommendation, Variant,
};

pub trait ExperimentStorage: Send + Sync {
    fn insert(&self, experiment: Experiment);
    fn get(&self, id: ExperimentId) -> Option<Experiment>;
    fn update(&self, experiment: Experiment);
    fn list(&self) -> Vec<Experiment>;
}

#[derive(Default)]
pub struct InMemoryExperimentStorage {
    experiments: RwLock<HashMap<ExperimentId, Experiment>>,
}

impl ExperimentStorage for InMemoryExperimentStorage {
    fn insert(&self, experiment: Experiment) {
        self.experiments.write().insert(experiment.id, experiment);
    }

    fn get(&self, id: ExperimentId) -> Option<Experiment> {
        self.experiments.read().get(&id).cloned()
    }

    fn update(&self, experiment: Experiment) {
        self.experiments.write().insert(experiment.id, experiment);
    }

    fn list(&self) -> Vec<Experiment> {
        self.experiments.read().values().cloned().collect()
    }
}

pub struct ExperimentController<S: PromptStorage + ?Sized> {
    storage: Arc<dyn ExperimentStorage>,
    prompts: Arc<PromptStore<S>>,
}

impl<S: PromptStorage + ?Sized + 'static> ExperimentController<S> {
    pub fn new(storage: Arc<dyn ExperimentStorage>, prompts: Arc<PromptStore<S>>) -> Self {
        Self { storage, prompts }
    }

    pub fn create(&self, mut experiment: Experiment) -> Result<Experiment> {
        let control_count = experiment.variants.iter().filter(|v| v.is_control).count();
        if control_count != 1 {
            return Err(HermesError::invalid("experiment must have exactly one control variant"));
        }
        normalize_weights(&mut experiment.variants);
        self.storage.insert(experiment.clone());
        Ok(experiment)
    }

    pub fn get(&self, id: ExperimentId) -> Result<Experiment> {
        self.storage
            .get(id)
            .ok_or_else(|| HermesError::not_found(format!("experiment {id}")))
    }

    pub fn start(&self, id: ExperimentId) -> Result<Experiment> {
        self.transition(id, ExperimentStatus::Running, |e| {
            e.started_at = Some(now_millis());
        })
    }

    pub fn pause(&self, id: ExperimentId) -> Result<Experiment> {
        self.transition(id, ExperimentStatus::Paused, |_| {})
    }

    pub fn resume(&self, id: ExperimentId) -> Result<Experiment> {
        self.transition(id, ExperimentStatus::Running, |_| {})
    }

    pub fn cancel(&self, id: ExperimentId) -> Result<Experiment> {
        self.transition(id, ExperimentStatus::Cancelled, |e| {
            e.ended_at = Some(now_millis());
        })
    }

    fn transition(
        &self,
        id: ExperimentId,
        next: ExperimentStatus,
        mutate: impl FnOnce(&mut Experiment),
    ) -> Result<Experiment> {
        let mut experiment = self.get(id)?;
        if !experiment.status.can_transition_to(next) {
            return Err(HermesError::invalid(format!(
                "illegal experiment transition {:?} -> {:?}",
                experiment.status, next
            )));
        }
        experiment.status = next;
        mutate(&mut experiment);
        self.storage.update(experiment.clone());
        Ok(experiment)
    }

    /// `assignVariant(experimentId, userId)`, per `spec.md` §4.4.
    pub fn assign_variant(&self, id: ExperimentId, user_id: &str) -> Result<Option<Variant>> {
        let experiment = self.get(id)?;
        Ok(assign_variant(&experiment, user_id).cloned())
    }

    pub fn record_impression(&self, id: ExperimentId, variant_id: &str, user_id: &str) -> Result<()> {
        self.record_event(id, variant_id, user_id, EventType::Impression, 0.0, None)
    }

    pub fn record_conversion(
        &self,
        id: ExperimentId,
        variant_id: &str,
        user_id: &str,
        value: f64,
    ) -> Result<()> {
        self.record_event(id, variant_id, user_id, EventType::Conversion, value, None)
    }

    pub fn record_metric(
        &self,
        id: ExperimentId,
        variant_id: &str,
        user_id: &str,
        metric_id: &str,
        value: f64,
    ) -> Result<()> {
        self.record_event(id, variant_id, user_id, EventType::Custom, value, Some(metric_id.to_string()))
    }

    fn record_event(
        &self,
        id: ExperimentId,
        variant_id: &str,
        user_id: &str,
        event_type: EventType,
        value: f64,
        metric_id: Option<String>,
    ) -> Result<()> {
        let mut experiment = self.get(id)?;
        let variant = experiment
            .variants
            .iter_mut()
            .find(|v| v.id == variant_id)
            .ok_or_else(|| HermesError::not_found(format!("variant {variant_id}")))?;

        match event_type {
            EventType::Impression => variant.stats.impressions += 1,
            EventType::Conversion => {
                variant.stats.conversions += 1;
                variant.stats.total_value += value;
            }
            EventType::Custom => variant.stats.total_latency += value,
        }

        let _event = ExperimentEvent {
            experiment_id: id,
            variant_id: variant_id.to_string(),
            user_id: user_id.to_string(),
            event_type,
            value,
            metric_id,
            timestamp: now_millis(),
        };

        self.storage.update(experiment);
        Ok(())
    }

    /// `stopExperiment(id, computeResults)`: transitions to `completed` and
    /// computes the final result.
    pub fn stop_experiment(&self, id: ExperimentId) -> Result<Experiment> {
        let mut experiment = self.get(id)?;
        if !experiment.status.can_transition_to(ExperimentStatus::Completed) {
            return Err(HermesError::invalid(format!(
                "cannot stop experiment in state {:?}",
                experiment.status
            )));
        }

        let pairwise = evaluate_significance(&experiment);
        let recommendation = recommend(&experiment, &pairwise, now_millis());

        let winner_variant_id = if matches!(recommendation, Recommendation::PromoteWinner) {
            pairwise.as_ref().and_then(|pairs| {
                pairs
                    .iter()
                    .filter(|p| p.significant && p.lift > 0.0)
                    .max_by(|a, b| a.lift.partial_cmp(&b.lift).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|p| p.variant_id.clone())
            })
        } else {
            None
        };

        experiment.status = ExperimentStatus::Completed;
        experiment.ended_at = Some(now_millis());
        experiment.winner_variant_id = winner_variant_id.clone();
        experiment.result = Some(ExperimentResult {
            winner_variant_id,
            pairwise: pairwise.unwrap_or_default(),
            recommendation,
        });

        self.storage.update(experiment.clone());
        Ok(experiment)
    }

    /// Evaluates whether `experiment` should auto-promote its winner and, if
    /// so, transitions the winning variant's prompt version to `deployed`
    /// before marking the experiment completed. Completes the loop the
    /// original source left as an unimplemented stub (`SPEC_FULL.md` §4.4).
    pub async fn check_and_promote(&self, id: ExperimentId) -> Result<Experiment> {
        let experiment = self.get(id)?;
        if !experiment.auto_promote || experiment.status != ExperimentStatus::Running {
            return Ok(experiment);
        }

        let pairwise = evaluate_significance(&experiment);
        let recommendation = recommend(&experiment, &pairwise, now_millis());

        if !matches!(recommendation, Recommendation::PromoteWinner) {
            return Ok(experiment);
        }

        let winner_id = pairwise
            .as_ref()
            .and_then(|pairs| {
                pairs
                    .iter()
                    .filter(|p| p.significant && p.lift > 0.0)
                    .max_by(|a, b| a.lift.partial_cmp(&b.lift).unwrap_or(std::cmp::Ordering::Equal))
            })
            .map(|p| p.variant_id.clone())
            .ok_or_else(|| HermesError::invalid("promote_winner recommended with no qualifying variant"))?;

        let variant = experiment
            .variants
            .iter()
            .find(|v| v.id == winner_id)
            .ok_or_else(|| HermesError::not_found(format!("variant {winner_id}")))?
            .clone();

        self.promote_variant(&variant).await?;

        self.stop_experiment(id)
    }

    async fn promote_variant(&self, variant: &Variant) -> Result<()> {
        let mut prompt = self.prompts.get(variant.prompt_id).await?;

        if prompt.version != variant.prompt_version {
            prompt = self
                .prompts
                .rollback(variant.prompt_id, &variant.prompt_version, "experiment-controller")
                .await?;
        }

        if prompt.state != PromptState::Staged && prompt.state != PromptState::Deployed {
            self.prompts
                .update(
                    variant.prompt_id,
                    UpdatePromptParams { state: Some(PromptState::Staged), ..Default::default() },
                    "staged by experiment auto-promotion",
                    "experiment-controller",
                )
                .await?;
        }

        self.prompts
            .update(
                variant.prompt_id,
                UpdatePromptParams { state: Some(PromptState::Deployed), ..Default::default() },
                "deployed by experiment auto-promotion",
                "experiment-controller",
            )
            .await?;

        Ok(())
    }
}

fn normalize_weights(variants: &mut [Variant]) {
    let total: f64 = variants.iter().map(|v| v.weight).sum();
    if total <= 0.0 {
        let equal = 1.0 / variants.len().max(1) as f64;
        for v in variants.iter_mut() {
            v.weight = equal;
        }
    } else if (total - 1.0).abs() > 1e-9 {
        for v in variants.iter_mut() {
            v.weight /= total;
        }
    }
}
