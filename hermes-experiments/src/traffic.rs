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

//! Deterministic traffic assignment: `assignVariant`, per `spec.md` §4.4.

use md5::{Digest, Md5};
use rand::Rng;

use crate::types::{Experiment, ExperimentStatus, TrafficSplitStrategy, Variant};

/// `toFloat01(md5(s))`: first 4 bytes of the digest as a big-endian `u32`,
/// normalised against `u32::MAX`, matching
/// `int(md5(...).hexdigest()[:8], 16) / 0xFFFFFFFF` in the original source
/// (`SPEC_FULL.md` §4.4).
fn hash_to_unit_interval(s: &str) -> f64 {
    let digest = Md5::digest(s.as_bytes());
    let bytes: [u8; 4] = [digest[0], digest[1], digest[2], digest[3]];
    u32::from_be_bytes(bytes) as f64 / u32::MAX as f64
}

fn traffic_hash(user_id: &str, experiment_id: u128) -> f64 {
    hash_to_unit_interval(&format!("{user_id}:{experiment_id}"))
}

fn variant_hash(user_id: &str, experiment_id: u128) -> f64 {
    hash_to_unit_interval(&format!("variant:{user_id}:{experiment_id}"))
}

fn pick_equal(variants: &[Variant], hash: f64) -> &Variant {
    let idx = ((hash * variants.len() as f64) as usize).min(variants.len() - 1);
    &variants[idx]
}

fn pick_weighted(variants: &[Variant], hash: f64) -> &Variant {
    let mut cumulative = 0.0;
    for variant in variants {
        cumulative += variant.weight;
        if hash <= cumulative {
            return variant;
        }
    }
    variants.last().expect("non-empty variants")
}

fn pick_epsilon_greedy<'a>(variants: &'a [Variant], epsilon: f64, hash: f64) -> &'a Variant {
    if hash < epsilon {
        return pick_equal(variants, {
            let mut rng = rand::thread_rng();
            rng.gen::<f64>()
        });
    }
    variants
        .iter()
        .max_by(|a, b| {
            a.stats
                .conversion_rate()
                .partial_cmp(&b.stats.conversion_rate())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("non-empty variants")
}

fn gamma_sample(shape: f64, rng: &mut rand::rngs::ThreadRng) -> f64 {
    // Marsaglia-Tsang method; shape is always >= 1 here (conversions+1 etc.).
    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let mut x;
        let mut v;
        loop {
            x = standard_normal(rng);
            v = 1.0 + c * x;
            if v > 0.0 {
                break;
            }
        }
        let v3 = v * v * v;
        let u: f64 = rng.gen();
        if u < 1.0 - 0.0331 * x * x * x * x {
            return d * v3;
        }
        if u.ln() < 0.5 * x * x + d * (1.0 - v3 + v3.ln()) {
            return d * v3;
        }
    }
}

fn standard_normal(rng: &mut rand::rngs::ThreadRng) -> f64 {
    // Box-Muller; good enough for Thompson sampling's approximate posterior draw.
    let u1: f64 = rng.gen::<f64>().max(1e-12);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn sample_beta(alpha: f64, beta: f64, rng: &mut rand::rngs::ThreadRng) -> f64 {
    // Two independent Gamma(k, 1) draws; their ratio gives Beta(alpha, beta).
    let ga = gamma_sample(alpha, rng);
    let gb = gamma_sample(beta, rng);
    if ga + gb <= 0.0 {
        0.0
    } else {
        ga / (ga + gb)
    }
}

fn pick_thompson(variants: &[Variant]) -> &Variant {
    let mut rng = rand::thread_rng();
    variants
        .iter()
        .max_by(|a, b| {
            let sample_a = sample_beta(
                a.stats.conversions as f64 + 1.0,
                (a.stats.impressions - a.stats.conversions) as f64 + 1.0,
                &mut rng,
            );
            let sample_b = sample_beta(
                b.stats.conversions as f64 + 1.0,
                (b.stats.impressions - b.stats.conversions) as f64 + 1.0,
                &mut rng,
            );
            sample_a.partial_cmp(&sample_b).unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("non-empty variants")
}

fn pick_ucb(variants: &[Variant], c: f64) -> &Variant {
    if let Some(untried) = variants.iter().find(|v| v.stats.impressions == 0) {
        return untried;
    }
    let total: u64 = variants.iter().map(|v| v.stats.impressions).sum();
    variants
        .iter()
        .max_by(|a, b| {
            let score = |v: &Variant| {
                v.stats.conversion_rate()
                    + c * ((total as f64).ln() / v.stats.impressions as f64).sqrt()
            };
            score(a).partial_cmp(&score(b)).unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("non-empty variants")
}

/// `assignVariant(experimentId, userId) -> Variant | nil`, per `spec.md`
/// §4.4. Deterministic and side-effect-free for the `equal`/`weighted`
/// strategies; `epsilon_greedy`/`thompson`/`ucb` consult live variant
/// statistics and so are not guaranteed to repeat across calls.
pub fn assign_variant<'a>(experiment: &'a Experiment, user_id: &str) -> Option<&'a Variant> {
    if experiment.status != ExperimentStatus::Running {
        return None;
    }
    if experiment.variants.is_empty() {
        return None;
    }

    let t_hash = traffic_hash(user_id, experiment.id);
    if t_hash > experiment.traffic_percentage / 100.0 {
        return None;
    }

    let v_hash = variant_hash(user_id, experiment.id);
    Some(match experiment.traffic_split {
        TrafficSplitStrategy::Equal => pick_equal(&experiment.variants, v_hash),
        TrafficSplitStrategy::Weighted => pick_weighted(&experiment.variants, v_hash),
        TrafficSplitStrategy::EpsilonGreedy { epsilon } => {
            pick_epsilon_greedy(&experiment.variants, epsilon, v_hash)
        }
        TrafficSplitStrategy::Thompson => pick_thompson(&experiment.variants),
        TrafficSplitStrategy::Ucb { c } => pick_ucb(&experiment.variants, c),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{VariantStats};
    use hermes_prompts::PromptId;

    fn variant(id: &str, weight: f64, is_control: bool) -> Variant {
        Variant {
            id: id.to_string(),
            name: id.to_string(),
            prompt_id: 1 as PromptId,
            prompt_version: semver::Version::new(1, 0, 0),
            weight,
            is_control,
            stats: VariantStats::default(),
        }
    }

    fn experiment(traffic_percentage: f64) -> Experiment {
        Experiment {
            id: 1,
            name: "exp".to_string(),
            status: ExperimentStatus::Running,
            variants: vec![variant("a", 0.5, true), variant("b", 0.5, false)],
            metrics: vec![],
            traffic_split: TrafficSplitStrategy::Equal,
            traffic_percentage,
            min_sample_size: 1000,
            max_duration_days: 14,
            confidence_threshold: 0.95,
            auto_promote: false,
            created_at: 0,
            started_at: Some(0),
            ended_at: None,
            winner_variant_id: None,
            result: None,
        }
    }

    /// Scenario S4: the same (userId, experimentId) always yields the same
    /// variant under the `equal` strategy.
    #[test]
    fn s4_deterministic_assignment_is_stable() {
        let exp = experiment(100.0);
        let first = assign_variant(&exp, "u-42").map(|v| v.id.clone());
        for _ in 0..20 {
            assert_eq!(assign_variant(&exp, "u-42").map(|v| v.id.clone()), first);
        }
        assert!(first.is_some());
    }

    #[test]
    fn s4_reduced_traffic_percentage_excludes_some_users() {
        let exp = experiment(50.0);
        let excluded = (0..500)
            .filter(|i| assign_variant(&exp, &format!("user-{i}")).is_none())
            .count();
        assert!(excluded > 100 && excluded < 400, "excluded={excluded}");
    }

    #[test]
    fn non_running_experiment_never_assigns() {
        let mut exp = experiment(100.0);
        exp.status = ExperimentStatus::Draft;
        assert!(assign_variant(&exp, "u-42").is_none());
    }
}
