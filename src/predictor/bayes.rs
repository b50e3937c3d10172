//! Feature-conditioned Bayesian estimator
//!
//! Treats the last L outcomes as a feature, counts how often that exact
//! feature was followed by each side across the whole history, and forms
//! a Laplace-smoothed posterior against the global-frequency prior.

use crate::types::Outcome;

/// Default feature length; capped by available history.
pub const DEFAULT_FEATURE_LEN: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct BayesEstimate {
    pub prob_high: f64,
    /// Confidence percentage derived from posterior separation, floor 50.
    pub confidence: f64,
    /// Historical occurrences of the feature (smoothing excluded).
    pub support: u64,
}

impl BayesEstimate {
    fn neutral() -> Self {
        Self {
            prob_high: 0.5,
            confidence: 50.0,
            support: 0,
        }
    }
}

/// Posterior P(High | last L outcomes).
pub fn posterior(sequence: &[Outcome], feature_len: usize) -> BayesEstimate {
    let n = sequence.len();
    if n < 2 || feature_len == 0 {
        return BayesEstimate::neutral();
    }
    let len = feature_len.min(n.saturating_sub(1)).max(1);
    let feature = &sequence[n - len..];

    // Prior from global frequency.
    let high_total = sequence.iter().filter(|&&o| o == Outcome::High).count();
    let prior_high = high_total as f64 / n as f64;
    let prior_low = 1.0 - prior_high;

    // Count followers of every earlier occurrence of the feature.
    let mut followed_high = 0u64;
    let mut followed_low = 0u64;
    for i in 0..n - len {
        if &sequence[i..i + len] == feature {
            match sequence[i + len] {
                Outcome::High => followed_high += 1,
                Outcome::Low => followed_low += 1,
            }
        }
    }
    let support = followed_high + followed_low;

    // Add-one smoothing keeps both likelihoods strictly positive.
    let likelihood_high = (followed_high + 1) as f64 / (support + 2) as f64;
    let likelihood_low = (followed_low + 1) as f64 / (support + 2) as f64;

    let joint_high = likelihood_high * prior_high;
    let joint_low = likelihood_low * prior_low;
    let norm = joint_high + joint_low;
    if norm == 0.0 {
        // Both priors zero is impossible with n >= 2 unless the history
        // is one-sided and the feature matched nothing; stay neutral.
        return BayesEstimate::neutral();
    }

    let prob_high = joint_high / norm;
    let separation = (prob_high - (1.0 - prob_high)).abs();
    BayesEstimate {
        prob_high,
        confidence: (50.0 + separation * 50.0).max(50.0),
        support,
    }
}
