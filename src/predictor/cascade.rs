//! Self-learning correction cascade
//!
//! An ordered list of correction rules evaluated first-match-wins:
//! dictionary template, learned pattern memory, error memory,
//! consecutive-miss override, streak-break state machine, named-shape
//! reversal, and a dice-total fallback that also grows the learned
//! pattern store. Rule order is data, not control flow, so each rule is
//! independently testable.
//!
//! The cascade reads the shared learned state and writes back only the
//! break-attempt flags (rule 5) and a new learned entry (rule 7); all
//! other accuracy bookkeeping is the ingestion path's job.

use super::dictionary::TemplateDictionary;
use super::shape::{self, current_streak};
use crate::types::{Outcome, HIGH_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Minimum sightings before a learned pattern may fire.
const PATTERN_MIN_SEEN: u32 = 3;
/// Minimum historical accuracy before a learned pattern may fire.
const PATTERN_MIN_ACCURACY: f64 = 0.6;
/// Misses recorded against a tail before the error-memory rule flips.
const ERROR_MEMORY_THRESHOLD: u32 = 2;
/// Consecutive wrong predictions before the miss override flips.
const MISS_OVERRIDE_THRESHOLD: u32 = 3;
/// Learned pattern store cap; least-seen entries are evicted beyond it.
const PATTERN_MEMORY_CAP: usize = 8192;

/// Suffix lengths mirrored into the learned pattern store.
pub const LEARNED_SUFFIX_LENGTHS: std::ops::RangeInclusive<usize> = 3..=8;

/// Die face whose appearance confirms a streak break for each side.
/// A 1 drags the total down out of High territory; a 6 pushes it up
/// out of Low territory.
pub fn break_confirm_face(side: Outcome) -> u8 {
    match side {
        Outcome::High => 1,
        Outcome::Low => 6,
    }
}

/// Per-side probe flag of the streak-break state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BreakAttempt {
    #[default]
    Idle,
    Attempted,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BreakFlags {
    pub high: BreakAttempt,
    pub low: BreakAttempt,
}

impl BreakFlags {
    pub fn get(&self, side: Outcome) -> BreakAttempt {
        match side {
            Outcome::High => self.high,
            Outcome::Low => self.low,
        }
    }

    pub fn set(&mut self, side: Outcome, value: BreakAttempt) {
        match side {
            Outcome::High => self.high = value,
            Outcome::Low => self.low = value,
        }
    }
}

/// One learned suffix pattern: sightings, naive-predictor hits, and the
/// most recent follower.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PatternStat {
    pub seen: u32,
    pub hits: u32,
    pub next: Outcome,
}

impl PatternStat {
    pub fn accuracy(&self) -> f64 {
        if self.seen == 0 {
            return 0.0;
        }
        self.hits as f64 / self.seen as f64
    }
}

/// Mutable learned state shared between ingestion and the cascade.
/// Single-writer: the store serializes all mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnedState {
    pub pattern_memory: HashMap<String, PatternStat>,
    /// 3-outcome tails that preceded recorded prediction misses.
    pub error_memory: HashMap<String, u32>,
    /// Running count of consecutive wrong predictions.
    pub miss_streak: u32,
    pub break_flags: BreakFlags,
}

impl LearnedState {
    /// Ingestion bookkeeping: fold the settled outcome into every
    /// tracked suffix of the pattern string as it was *before* the
    /// outcome landed.
    pub fn observe(&mut self, pattern_before: &str, actual: Outcome) {
        for len in LEARNED_SUFFIX_LENGTHS {
            if pattern_before.len() < len {
                break;
            }
            let key = &pattern_before[pattern_before.len() - len..];
            if let Some(entry) = self.pattern_memory.get_mut(key) {
                entry.seen += 1;
                if entry.next == actual {
                    entry.hits += 1;
                }
                entry.next = actual;
            } else {
                self.insert_pattern(key.to_string(), PatternStat { seen: 1, hits: 1, next: actual });
            }
        }
    }

    /// Ingestion bookkeeping: score the previous prediction against the
    /// settled outcome, driving the miss streak and error memory.
    pub fn record_result(&mut self, tail3: Option<&str>, predicted: Outcome, actual: Outcome) {
        if predicted == actual {
            self.miss_streak = 0;
            return;
        }
        self.miss_streak += 1;
        if let Some(tail) = tail3 {
            if tail.len() == 3 {
                *self.error_memory.entry(tail.to_string()).or_insert(0) += 1;
            }
        }
    }

    fn insert_pattern(&mut self, key: String, stat: PatternStat) {
        if self.pattern_memory.len() >= PATTERN_MEMORY_CAP {
            // Evict the least-seen entry (ties broken by key for
            // determinism) to keep the store bounded.
            if let Some(evict) = self
                .pattern_memory
                .iter()
                .min_by(|a, b| a.1.seen.cmp(&b.1.seen).then_with(|| a.0.cmp(b.0)))
                .map(|(k, _)| k.clone())
            {
                self.pattern_memory.remove(&evict);
            }
        }
        self.pattern_memory.insert(key, stat);
    }
}

/// Which correction rule produced the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    Dictionary,
    PatternMemory,
    ErrorMemory,
    MissOverride,
    StreakBreak,
    NamedShape,
    TotalFallback,
}

/// Evaluation order; first match wins.
pub const RULE_ORDER: [Rule; 7] = [
    Rule::Dictionary,
    Rule::PatternMemory,
    Rule::ErrorMemory,
    Rule::MissOverride,
    Rule::StreakBreak,
    Rule::NamedShape,
    Rule::TotalFallback,
];

#[derive(Debug, Clone)]
pub struct CascadeDecision {
    pub rule: Rule,
    pub outcome: Outcome,
    pub confidence: f64,
    pub rationale: String,
}

/// Read-only inputs to one cascade pass.
pub struct CascadeInput<'a> {
    pub sequence: &'a [Outcome],
    /// Compact pattern string parallel to `sequence`.
    pub pattern: &'a str,
    /// Dice triple of the most recent observation, when known.
    pub latest_dice: Option<[u8; 3]>,
    pub dictionary: &'a TemplateDictionary,
}

/// Run the cascade. Returns `None` only when no rule can fire (empty
/// history).
pub fn correct(input: &CascadeInput<'_>, state: &mut LearnedState) -> Option<CascadeDecision> {
    for rule in RULE_ORDER {
        let decision = match rule {
            Rule::Dictionary => dictionary_rule(input),
            Rule::PatternMemory => pattern_memory_rule(input, state),
            Rule::ErrorMemory => error_memory_rule(input, state),
            Rule::MissOverride => miss_override_rule(input, state),
            Rule::StreakBreak => streak_break_rule(input, state),
            Rule::NamedShape => named_shape_rule(input),
            Rule::TotalFallback => total_fallback_rule(input, state),
        };
        if decision.is_some() {
            return decision;
        }
    }
    None
}

fn dictionary_rule(input: &CascadeInput<'_>) -> Option<CascadeDecision> {
    let entry = input.dictionary.lookup_suffix(input.pattern)?;
    Some(CascadeDecision {
        rule: Rule::Dictionary,
        outcome: entry.prediction,
        confidence: entry.confidence,
        rationale: format!("dictionary: {}", entry.rationale),
    })
}

fn pattern_memory_rule(
    input: &CascadeInput<'_>,
    state: &LearnedState,
) -> Option<CascadeDecision> {
    let mut best: Option<(&String, &PatternStat)> = None;
    for (key, stat) in &state.pattern_memory {
        if stat.seen < PATTERN_MIN_SEEN || stat.accuracy() < PATTERN_MIN_ACCURACY {
            continue;
        }
        if !input.pattern.ends_with(key.as_str()) {
            continue;
        }
        let better = match best {
            None => true,
            Some((bk, bs)) => {
                let (a, b) = (stat.accuracy(), bs.accuracy());
                a > b || (a == b && (key.len(), key.as_str()) > (bk.len(), bk.as_str()))
            }
        };
        if better {
            best = Some((key, stat));
        }
    }
    let (key, stat) = best?;
    let accuracy = stat.accuracy();
    Some(CascadeDecision {
        rule: Rule::PatternMemory,
        outcome: stat.next,
        confidence: (50.0 + accuracy * 45.0).min(95.0),
        rationale: format!(
            "learned pattern {} ({}/{} correct)",
            key, stat.hits, stat.seen
        ),
    })
}

fn error_memory_rule(input: &CascadeInput<'_>, state: &LearnedState) -> Option<CascadeDecision> {
    if input.pattern.len() < 3 {
        return None;
    }
    let tail3 = &input.pattern[input.pattern.len() - 3..];
    let misses = *state.error_memory.get(tail3)?;
    if misses < ERROR_MEMORY_THRESHOLD {
        return None;
    }
    let last = *input.sequence.last()?;
    Some(CascadeDecision {
        rule: Rule::ErrorMemory,
        outcome: last.opposite(),
        confidence: 85.0,
        rationale: format!("tail {} burned us {} times, flipping", tail3, misses),
    })
}

fn miss_override_rule(input: &CascadeInput<'_>, state: &LearnedState) -> Option<CascadeDecision> {
    if state.miss_streak < MISS_OVERRIDE_THRESHOLD {
        return None;
    }
    let last = *input.sequence.last()?;
    Some(CascadeDecision {
        rule: Rule::MissOverride,
        outcome: last.opposite(),
        confidence: 80.0,
        rationale: format!("{} consecutive misses, flipping", state.miss_streak),
    })
}

fn streak_break_rule(input: &CascadeInput<'_>, state: &mut LearnedState) -> Option<CascadeDecision> {
    let streak = current_streak(input.sequence);
    if streak.len < 3 {
        return None;
    }
    let side = streak.side?;
    let confirm = break_confirm_face(side);
    let confirmed = input
        .latest_dice
        .map(|dice| dice.contains(&confirm))
        .unwrap_or(false);

    if streak.len >= 5 && !confirmed && state.break_flags.get(side) == BreakAttempt::Idle {
        // Probe: try the break once, then wait for confirmation.
        state.break_flags.set(side, BreakAttempt::Attempted);
        return Some(CascadeDecision {
            rule: Rule::StreakBreak,
            outcome: side.opposite(),
            confidence: 72.0,
            rationale: format!("probing break of {} streak ({})", side, streak.len),
        });
    }
    if streak.len >= 5 && !confirmed {
        return Some(CascadeDecision {
            rule: Rule::StreakBreak,
            outcome: side,
            confidence: 76.0,
            rationale: format!("riding {} streak ({}) awaiting face {}", side, streak.len, confirm),
        });
    }
    if confirmed {
        state.break_flags.set(side, BreakAttempt::Idle);
        return Some(CascadeDecision {
            rule: Rule::StreakBreak,
            outcome: side.opposite(),
            confidence: 86.0,
            rationale: format!("face {} confirms {} streak break", confirm, side),
        });
    }
    Some(CascadeDecision {
        rule: Rule::StreakBreak,
        outcome: side,
        confidence: 82.0,
        rationale: format!("short {} streak ({}) continues", side, streak.len),
    })
}

fn named_shape_rule(input: &CascadeInput<'_>) -> Option<CascadeDecision> {
    let analysis = shape::analyze(input.sequence);
    let shape_label = analysis
        .labels
        .iter()
        .find(|l| l.starts_with("pattern") || l.starts_with("alternating"))?;
    let last = *input.sequence.last()?;
    Some(CascadeDecision {
        rule: Rule::NamedShape,
        outcome: last.opposite(),
        confidence: 75.0,
        rationale: format!("{} points to reversal", shape_label),
    })
}

fn total_fallback_rule(
    input: &CascadeInput<'_>,
    state: &mut LearnedState,
) -> Option<CascadeDecision> {
    let dice = input.latest_dice?;
    let total: u8 = dice.iter().sum();
    let outcome = if total >= HIGH_THRESHOLD {
        Outcome::High
    } else {
        Outcome::Low
    };
    // Deterministic confidence derived from how far the total sits from
    // the 10.5 midpoint.
    let confidence = (60.0 + (total as f64 - 10.5).abs() * 2.0).min(72.0);

    // Grow the learned store: remember what we predicted for this tail
    // if it has never been seen before.
    if input.pattern.len() >= *LEARNED_SUFFIX_LENGTHS.start() {
        let len = (*LEARNED_SUFFIX_LENGTHS.end()).min(input.pattern.len());
        let key = &input.pattern[input.pattern.len() - len..];
        if !state.pattern_memory.contains_key(key) {
            state.insert_pattern(
                key.to_string(),
                PatternStat {
                    seen: 1,
                    hits: 1,
                    next: outcome,
                },
            );
        }
    }

    Some(CascadeDecision {
        rule: Rule::TotalFallback,
        outcome,
        confidence,
        rationale: format!("total {} fallback", total),
    })
}
