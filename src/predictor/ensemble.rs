//! Vote combiner
//!
//! Merges every component estimate into one blended probability and an
//! entropy-based confidence. Component weights are static priors scaled
//! by a coverage boost, so thin-sample signals are discounted without
//! being zeroed. The expert panel contributes a small bounded additive
//! bias on top of the weighted mean.

use super::bayes::{self, DEFAULT_FEATURE_LEN};
use super::cascade::{self, CascadeInput, LearnedState};
use super::dictionary::TemplateDictionary;
use super::experts;
use super::markov::MarkovEnsemble;
use super::monte_carlo;
use super::shape;
use crate::types::{ComponentProbs, EnsembleResult, Observation, Outcome};

// Static prior weights. The first four mirror the long-standing tuning
// of the base combiner; the rest cover the evolved components.
const W_MARKOV: f64 = 0.46;
const W_SHAPE: f64 = 0.28;
const W_LOCAL: f64 = 0.14;
const W_GLOBAL: f64 = 0.12;
const W_CASCADE: f64 = 0.30;
const W_BAYES: f64 = 0.22;
const W_DICTIONARY: f64 = 0.20;
const W_MONTE_CARLO: f64 = 0.18;

/// Operating band for the final confidence percentage.
pub const CONF_MIN: f64 = 52.0;
pub const CONF_MAX: f64 = 97.5;

const LOCAL_LOOKBACK: usize = 10;
const EXPERT_BIAS_SCALE: f64 = 0.1;

/// The full prediction ensemble with its immutable supporting tables.
pub struct Ensemble {
    dictionary: TemplateDictionary,
    simulations: usize,
}

impl Ensemble {
    pub fn new(simulations: usize) -> Self {
        Self {
            dictionary: TemplateDictionary::build(),
            simulations,
        }
    }

    pub fn dictionary(&self) -> &TemplateDictionary {
        &self.dictionary
    }

    /// Produce a full prediction for the next outcome.
    ///
    /// Read-mostly: the only writes are the cascade's break flags and
    /// its rule-7 learned entry, both inside `state`.
    pub fn predict(
        &self,
        observations: &[Observation],
        pattern: &str,
        markov: &MarkovEnsemble,
        state: &mut LearnedState,
    ) -> EnsembleResult {
        let sequence: Vec<Outcome> = observations.iter().map(|o| o.outcome).collect();
        let dice_history: Vec<[u8; 3]> = observations.iter().map(|o| o.dice).collect();

        // Independent component estimates. Every one of them degrades
        // to 0.5 on insufficient data instead of failing.
        let markov_est = markov.predict(&sequence);
        let shape_analysis = shape::analyze(&sequence);
        let local = local_trend(&sequence, LOCAL_LOOKBACK);
        let global = global_freq(&sequence);
        let bayes_est = bayes::posterior(&sequence, DEFAULT_FEATURE_LEN);
        let mc_est = monte_carlo::simulate(&dice_history, self.simulations);

        let dict_entry = self.dictionary.lookup_suffix(pattern);
        let dict_prob = dict_entry
            .map(|e| match e.prediction {
                Outcome::High => e.confidence / 100.0,
                Outcome::Low => 1.0 - e.confidence / 100.0,
            })
            .unwrap_or(0.5);

        let cascade_decision = cascade::correct(
            &CascadeInput {
                sequence: &sequence,
                pattern,
                latest_dice: observations.last().map(|o| o.dice),
                dictionary: &self.dictionary,
            },
            state,
        );
        let cascade_prob = cascade_decision
            .as_ref()
            .map(|d| match d.outcome {
                Outcome::High => d.confidence / 100.0,
                Outcome::Low => 1.0 - d.confidence / 100.0,
            })
            .unwrap_or(0.5);

        let components = ComponentProbs {
            markov: markov_est.prob_high,
            shape: shape_analysis.prob_high(),
            local_freq: local.prob,
            global_freq: global.prob,
            bayes: bayes_est.prob_high,
            monte_carlo: mc_est.prob_high,
            cascade: cascade_prob,
            dictionary: dict_prob,
        };

        // Weighted mean with coverage boosts.
        let n = sequence.len() as u64;
        let weighted: [(f64, f64); 8] = [
            (components.markov, W_MARKOV * coverage(markov_est.support)),
            (components.shape, W_SHAPE),
            (components.local_freq, W_LOCAL * coverage(local.n as u64)),
            (components.global_freq, W_GLOBAL * coverage(global.n as u64)),
            (components.bayes, W_BAYES * coverage(bayes_est.support)),
            (components.monte_carlo, W_MONTE_CARLO * coverage(mc_est.support)),
            (components.cascade, W_CASCADE * coverage(n)),
            (
                components.dictionary,
                W_DICTIONARY * coverage(if dict_entry.is_some() { n } else { 0 }),
            ),
        ];
        let weight_sum: f64 = weighted.iter().map(|(_, w)| w).sum();
        let mut p = if weight_sum > 0.0 {
            weighted.iter().map(|(p, w)| p * w).sum::<f64>() / weight_sum
        } else {
            0.5
        };

        // Expert panel: small additive bias, clamped back into [0, 1].
        let expert_votes = experts::panel(&sequence, observations);
        if !expert_votes.is_empty() {
            let bias: f64 = expert_votes
                .iter()
                .map(|ev| match ev.vote.outcome {
                    Outcome::High => ev.vote.confidence / 100.0,
                    Outcome::Low => -ev.vote.confidence / 100.0,
                })
                .sum::<f64>()
                / expert_votes.len() as f64;
            p = (p + bias * EXPERT_BIAS_SCALE).clamp(0.0, 1.0);
        }

        // Entropy-based confidence: maximal near p = 0 or 1, minimal at
        // the coin flip, then adjusted by pattern agreement.
        let mut confidence = (1.0 - binary_entropy(p)) * 100.0;
        let clear = shape_analysis.clear_label_count();
        if clear > 0 {
            confidence *= (1.03 + 0.03 * clear as f64).min(1.15);
        } else {
            confidence *= 0.96;
        }
        let confidence = confidence.clamp(CONF_MIN, CONF_MAX);

        let prediction = if p >= 0.5 { Outcome::High } else { Outcome::Low };

        let explain = build_explanation(
            &shape_analysis.labels,
            &components,
            &markov_est.trace,
            cascade_decision.as_ref().map(|d| d.rationale.as_str()),
            dict_entry.map(|e| e.rationale),
            prediction,
            confidence,
        );

        EnsembleResult {
            prediction,
            confidence,
            components,
            labels: shape_analysis.labels,
            explain,
        }
    }
}

/// Coverage boost: components backed by little data are discounted
/// without being zeroed.
fn coverage(support: u64) -> f64 {
    0.5 + ((1.0 + support as f64).log2() / 5.0).min(0.5)
}

struct FreqEstimate {
    prob: f64,
    n: usize,
}

fn local_trend(sequence: &[Outcome], lookback: usize) -> FreqEstimate {
    if sequence.is_empty() {
        return FreqEstimate { prob: 0.5, n: 0 };
    }
    let m = lookback.min(sequence.len());
    let window = &sequence[sequence.len() - m..];
    let high = window.iter().filter(|&&o| o == Outcome::High).count();
    FreqEstimate {
        prob: high as f64 / m as f64,
        n: m,
    }
}

fn global_freq(sequence: &[Outcome]) -> FreqEstimate {
    if sequence.is_empty() {
        return FreqEstimate { prob: 0.5, n: 0 };
    }
    let high = sequence.iter().filter(|&&o| o == Outcome::High).count();
    FreqEstimate {
        prob: high as f64 / sequence.len() as f64,
        n: sequence.len(),
    }
}

fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}

#[allow(clippy::too_many_arguments)]
fn build_explanation(
    labels: &[String],
    components: &ComponentProbs,
    markov_trace: &str,
    cascade_rationale: Option<&str>,
    dict_rationale: Option<&str>,
    prediction: Outcome,
    confidence: f64,
) -> String {
    let mut parts = vec![labels.join("; ")];
    parts.push(format!(
        "Markov {:.1}% High ({})",
        components.markov * 100.0,
        markov_trace
    ));
    parts.push(format!("shape {:.1}% High", components.shape * 100.0));
    parts.push(format!("last-10 {:.1}% High", components.local_freq * 100.0));
    parts.push(format!("overall {:.1}% High", components.global_freq * 100.0));
    parts.push(format!("Bayes {:.1}% High", components.bayes * 100.0));
    parts.push(format!(
        "Monte Carlo {:.1}% High",
        components.monte_carlo * 100.0
    ));
    if let Some(rationale) = cascade_rationale {
        parts.push(format!("correction: {}", rationale));
    }
    if let Some(rationale) = dict_rationale {
        parts.push(format!("template: {}", rationale));
    }
    parts.push(format!("verdict {} at {:.1}%", prediction, confidence));
    parts.join(". ")
}
