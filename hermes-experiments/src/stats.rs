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

//! Significance testing: a 2x2 chi-square test on the conversion contingency
//! table, generalised to N variants per `spec.md` §4.4, and a proper
//! regularised-incomplete-gamma chi-squared(1 df) tail approximation
//! replacing the source's bucket lookup (`SPEC_FULL.md` §4.4).

use crate::types::{Experiment, PairwiseSignificance, Recommendation, Variant};

/// `Σ (observed - expected)² / expected` over the four cells of the 2x2
/// conversion table `[[conv_a, non_conv_a], [conv_b, non_conv_b]]`.
fn chi_square_statistic(conv_a: f64, n_a: f64, conv_b: f64, n_b: f64) -> f64 {
    let non_conv_a = n_a - conv_a;
    let non_conv_b = n_b - conv_b;
    let total = n_a + n_b;
    if total <= 0.0 {
        return 0.0;
    }

    let row_a = conv_a + conv_b;
    let row_b = non_conv_a + non_conv_b;

    let expected = |row: f64, col: f64| row * col / total;
    let term = |observed: f64, expected: f64| {
        if expected <= 0.0 {
            0.0
        } else {
            (observed - expected).powi(2) / expected
        }
    };

    term(conv_a, expected(row_a, n_a))
        + term(non_conv_a, expected(row_b, n_a))
        + term(conv_b, expected(row_a, n_b))
        + term(non_conv_b, expected(row_b, n_b))
}

/// Regularised lower incomplete gamma function, via series expansion (small
/// x) or continued fraction (large x). Grounded on
/// `agentreplay-evals/src/comparator.rs`'s `regularized_gamma`.
fn regularized_gamma(a: f64, x: f64) -> f64 {
    if x < 0.0 || a <= 0.0 {
        return 0.0;
    }
    if x < a + 1.0 {
        let mut sum = 1.0 / a;
        let mut term = sum;
        for n in 1..100 {
            term *= x / (a + n as f64);
            sum += term;
            if term.abs() < 1e-10 {
                break;
            }
        }
        sum * (-x + a * x.ln() - ln_gamma(a)).exp()
    } else {
        1.0 - incomplete_gamma_cf(a, x)
    }
}

fn incomplete_gamma_cf(a: f64, x: f64) -> f64 {
    let mut f = 1.0;
    let mut c = 1.0;
    let mut d = 1.0 / x;

    for n in 1..100 {
        let an = if n % 2 == 1 {
            ((n as f64 + 1.0) / 2.0) - a
        } else {
            n as f64 / 2.0
        };
        let bn = x + n as f64 + 1.0 - a;

        d = bn + an * d;
        if d.abs() < 1e-30 {
            d = 1e-30;
        }
        c = bn + an / c;
        if c.abs() < 1e-30 {
            c = 1e-30;
        }
        d = 1.0 / d;
        let delta = c * d;
        f *= delta;
        if (delta - 1.0).abs() < 1e-10 {
            break;
        }
    }

    ((-x + a * x.ln() - ln_gamma(a)).exp() / x) * f
}

fn ln_gamma(z: f64) -> f64 {
    gamma(z).ln()
}

fn gamma(z: f64) -> f64 {
    const G: usize = 7;
    const C: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];

    if z < 0.5 {
        std::f64::consts::PI / ((std::f64::consts::PI * z).sin() * gamma(1.0 - z))
    } else {
        let z = z - 1.0;
        let mut x = C[0];
        for (i, c) in C.iter().enumerate().skip(1) {
            x += c / (z + i as f64);
        }
        let t = z + G as f64 + 0.5;
        (2.0 * std::f64::consts::PI).sqrt() * t.powf(z + 0.5) * (-t).exp() * x
    }
}

/// One-degree-of-freedom chi-squared upper-tail p-value,
/// `P(X > chi2 | df=1)`, via the regularised incomplete gamma function.
pub fn chi_squared_p_value_1df(chi2: f64) -> f64 {
    if chi2 <= 0.0 {
        return 1.0;
    }
    1.0 - regularized_gamma(0.5, chi2 / 2.0)
}

/// Runs the pairwise significance check between `control` and every other
/// variant in `experiment`, per `spec.md` §4.4 generalised to N variants
/// (`SPEC_FULL.md` §4.4).
pub fn evaluate_significance(experiment: &Experiment) -> Option<Vec<PairwiseSignificance>> {
    let control = experiment.control()?;
    let n_control = control.stats.impressions as f64;
    let pairwise: Vec<PairwiseSignificance> = experiment
        .variants
        .iter()
        .filter(|v| v.id != control.id)
        .map(|variant| {
            evaluate_pair(control, variant, experiment.confidence_threshold, experiment.min_sample_size)
        })
        .collect();
    Some(pairwise)
        .filter(|_| n_control > 0.0)
}

/// Mirrors `_check_significance`'s sample-size short-circuit: below
/// `min_sample_size` total impressions, the pair is reported
/// `insufficient_samples` without computing a chi-square statistic at all,
/// per `spec.md` line 160.
fn evaluate_pair(
    control: &Variant,
    treatment: &Variant,
    confidence_threshold: f64,
    min_sample_size: u64,
) -> PairwiseSignificance {
    let n_a = control.stats.impressions as f64;
    let n_b = treatment.stats.impressions as f64;
    let conv_a = control.stats.conversions as f64;
    let conv_b = treatment.stats.conversions as f64;

    if n_a + n_b < min_sample_size as f64 {
        return PairwiseSignificance {
            variant_id: treatment.id.clone(),
            chi_square: 0.0,
            p_value: 1.0,
            confidence: 0.0,
            lift: 0.0,
            significant: false,
        };
    }

    let chi2 = chi_square_statistic(conv_a, n_a, conv_b, n_b);
    let p_value = chi_squared_p_value_1df(chi2);
    let confidence = 1.0 - p_value;
    let significant = confidence >= confidence_threshold;

    let control_rate = control.stats.conversion_rate();
    let treatment_rate = treatment.stats.conversion_rate();
    let lift = if control_rate > 0.0 {
        (treatment_rate - control_rate) / control_rate
    } else {
        0.0
    };

    PairwiseSignificance {
        variant_id: treatment.id.clone(),
        chi_square: chi2,
        p_value,
        confidence,
        lift,
        significant,
    }
}

/// `_get_recommendation`, per `SPEC_FULL.md` §4.4's recovered vocabulary.
pub fn recommend(
    experiment: &Experiment,
    pairwise: &Option<Vec<PairwiseSignificance>>,
    now_millis: u64,
) -> Recommendation {
    if experiment.total_impressions() < experiment.min_sample_size {
        return overdue_check(experiment, now_millis);
    }

    let Some(pairwise) = pairwise else {
        return overdue_check(experiment, now_millis);
    };

    let best = pairwise
        .iter()
        .filter(|p| p.significant)
        .max_by(|a, b| a.lift.partial_cmp(&b.lift).unwrap_or(std::cmp::Ordering::Equal));

    match best {
        Some(p) if p.lift > 0.0 => Recommendation::PromoteWinner,
        Some(_) => Recommendation::KeepControl,
        None => overdue_check(experiment, now_millis),
    }
}

fn overdue_check(experiment: &Experiment, now_millis: u64) -> Recommendation {
    let started = experiment.started_at.unwrap_or(experiment.created_at);
    let elapsed_days = (now_millis.saturating_sub(started)) as f64 / 86_400_000.0;
    if elapsed_days > experiment.max_duration_days as f64 {
        Recommendation::InconclusiveStop
    } else {
        Recommendation::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExperimentStatus, TrafficSplitStrategy, VariantStats};
    use hermes_prompts::PromptId;

    fn variant(id: &str, is_control: bool, impressions: u64, conversions: u64) -> Variant {
        Variant {
            id: id.to_string(),
            name: id.to_string(),
            prompt_id: 1 as PromptId,
            prompt_version: semver::Version::new(1, 0, 0),
            weight: 0.5,
            is_control,
            stats: VariantStats { impressions, conversions, total_value: 0.0, total_latency: 0.0 },
        }
    }

    /// Scenario S5: control 100/1000, treatment 150/1000 crosses the 0.01
    /// significance threshold and recommends promoting.
    #[test]
    fn s5_significant_lift_recommends_promotion() {
        let experiment = Experiment {
            id: 1,
            name: "exp".to_string(),
            status: ExperimentStatus::Running,
            variants: vec![
                variant("control", true, 1000, 100),
                variant("treatment", false, 1000, 150),
            ],
            metrics: vec![],
            traffic_split: TrafficSplitStrategy::Equal,
            traffic_percentage: 100.0,
            min_sample_size: 1000,
            max_duration_days: 14,
            confidence_threshold: 0.95,
            auto_promote: false,
            created_at: 0,
            started_at: Some(0),
            ended_at: None,
            winner_variant_id: None,
            result: None,
        };

        let pairwise = evaluate_significance(&experiment).expect("control has impressions");
        assert_eq!(pairwise.len(), 1);
        let p = &pairwise[0];
        assert!(p.chi_square > 6.63, "chi_square={}", p.chi_square);
        assert!(p.p_value < 0.01, "p_value={}", p.p_value);
        assert!(p.significant);
        assert!((p.lift - 0.5).abs() < 0.01, "lift={}", p.lift);

        let recommendation = recommend(&experiment, &Some(pairwise), 0);
        assert!(matches!(recommendation, Recommendation::PromoteWinner));
    }

    #[test]
    fn pair_below_min_sample_size_is_not_significant_regardless_of_rate_gap() {
        let control = variant("control", true, 1, 0);
        let treatment = variant("treatment", false, 1, 1);
        let pair = evaluate_pair(&control, &treatment, 0.95, 1000);
        assert!(!pair.significant);
        assert_eq!(pair.chi_square, 0.0);
        assert_eq!(pair.p_value, 1.0);
    }

    #[test]
    fn below_min_sample_size_does_not_yet_promote() {
        let experiment = Experiment {
            id: 1,
            name: "exp".to_string(),
            status: ExperimentStatus::Running,
            variants: vec![variant("control", true, 10, 1), variant("treatment", false, 10, 2)],
            metrics: vec![],
            traffic_split: TrafficSplitStrategy::Equal,
            traffic_percentage: 100.0,
            min_sample_size: 1000,
            max_duration_days: 14,
            confidence_threshold: 0.95,
            auto_promote: false,
            created_at: 0,
            started_at: Some(0),
            ended_at: None,
            winner_variant_id: None,
            result: None,
        };
        let recommendation = recommend(&experiment, &None, 0);
        assert!(matches!(recommendation, Recommendation::Continue));
    }

    #[test]
    fn chi_squared_p_value_decreases_as_statistic_grows() {
        let p_small = chi_squared_p_value_1df(0.5);
        let p_large = chi_squared_p_value_1df(10.83);
        assert!(p_small > p_large);
        assert!(p_large < 0.01);
    }
}
