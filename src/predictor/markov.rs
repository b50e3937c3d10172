//! Multi-order Markov transition tables
//!
//! Maintains transition counts for context orders 1..=10 over the
//! outcome alphabet and blends the per-order estimates into one
//! probability. Longer, better-supported contexts dominate: each order's
//! weight is `k * log2(1 + followers)`, so a heavily observed long
//! context outranks a thin short one.

use crate::types::Outcome;
use std::collections::HashMap;

/// Highest context order tracked.
pub const MAX_ORDER: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionCell {
    pub high: u32,
    pub low: u32,
}

impl TransitionCell {
    pub fn total(&self) -> u32 {
        self.high + self.low
    }

    fn record(&mut self, next: Outcome) {
        match next {
            Outcome::High => self.high += 1,
            Outcome::Low => self.low += 1,
        }
    }
}

/// Blended Markov estimate for the next outcome.
#[derive(Debug, Clone)]
pub struct MarkovEstimate {
    /// Probability the next outcome is `High`.
    pub prob_high: f64,
    /// Total follower observations backing the estimate.
    pub support: u64,
    /// Per-order breakdown for the rationale trace.
    pub trace: String,
}

impl MarkovEstimate {
    fn uncovered(reason: &str) -> Self {
        Self {
            prob_high: 0.5,
            support: 0,
            trace: format!("Markov: {}", reason),
        }
    }
}

/// Transition-count tables for orders 1..=`MAX_ORDER`.
pub struct MarkovEnsemble {
    /// `tables[k - 1]` maps a length-k context string to follower counts.
    tables: Vec<HashMap<String, TransitionCell>>,
}

impl MarkovEnsemble {
    pub fn new() -> Self {
        Self {
            tables: (0..MAX_ORDER).map(|_| HashMap::new()).collect(),
        }
    }

    /// Record the newest outcome against every context order the history
    /// can supply. Call with the sequence *including* the new outcome.
    pub fn update(&mut self, sequence: &[Outcome]) {
        let n = sequence.len();
        if n < 2 {
            return;
        }
        let next = sequence[n - 1];
        for k in 1..=MAX_ORDER {
            if n > k {
                let context = encode(&sequence[n - 1 - k..n - 1]);
                self.tables[k - 1].entry(context).or_default().record(next);
            }
        }
    }

    /// Rebuild every table from scratch. Used on cold start and reset;
    /// produces counts identical to replaying `update` per observation.
    pub fn rebuild(&mut self, sequence: &[Outcome]) {
        self.reset();
        if sequence.len() < 2 {
            return;
        }
        for k in 1..=MAX_ORDER {
            if sequence.len() <= k {
                continue;
            }
            for i in 0..sequence.len() - k {
                let context = encode(&sequence[i..i + k]);
                self.tables[k - 1]
                    .entry(context)
                    .or_default()
                    .record(sequence[i + k]);
            }
        }
    }

    pub fn reset(&mut self) {
        for table in &mut self.tables {
            table.clear();
        }
    }

    /// Blend all covered orders into one probability of `High`.
    pub fn predict(&self, sequence: &[Outcome]) -> MarkovEstimate {
        if sequence.len() < 2 {
            return MarkovEstimate::uncovered("insufficient history");
        }

        let mut agg_weight = 0.0;
        let mut agg_prob = 0.0;
        let mut support = 0u64;
        let mut details = Vec::new();

        for k in 1..=MAX_ORDER {
            if sequence.len() <= k {
                continue;
            }
            let context = encode(&sequence[sequence.len() - k..]);
            let Some(cell) = self.tables[k - 1].get(&context) else {
                continue;
            };
            let total = cell.total();
            if total == 0 {
                continue;
            }
            let p_high = cell.high as f64 / total as f64;
            let w = k as f64 * (1.0 + total as f64).log2();
            agg_prob += p_high * w;
            agg_weight += w;
            support += total as u64;
            details.push(format!("k={}:{}/{}H", k, cell.high, total));
        }

        if agg_weight == 0.0 {
            return MarkovEstimate::uncovered("no matching context");
        }

        let shown = if details.len() > 6 {
            format!("{},...", details[..6].join(","))
        } else {
            details.join(",")
        };

        MarkovEstimate {
            prob_high: agg_prob / agg_weight,
            support,
            trace: format!("Markov[{}]", shown),
        }
    }

    /// Total follower count recorded for order `k` (test accounting hook).
    pub fn order_total(&self, k: usize) -> u64 {
        self.tables
            .get(k - 1)
            .map(|t| t.values().map(|c| c.total() as u64).sum())
            .unwrap_or(0)
    }

    /// Snapshot of one order's table (for accounting comparisons).
    pub fn order_table(&self, k: usize) -> Option<&HashMap<String, TransitionCell>> {
        self.tables.get(k - 1)
    }
}

impl Default for MarkovEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(outcomes: &[Outcome]) -> String {
    outcomes.iter().map(|o| o.as_char()).collect()
}
