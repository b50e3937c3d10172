//! Expert panel
//!
//! Seven independent single-signal heuristics. Each expert is a pure
//! function of the history with no shared state, and falls back to a
//! defined neutral vote (last observed outcome at confidence 50) when
//! its triggering condition is absent.

use super::shape::current_streak;
use crate::types::{Observation, Outcome, Vote};

/// One expert's named vote.
#[derive(Debug, Clone)]
pub struct ExpertVote {
    pub name: &'static str,
    pub vote: Vote,
}

/// Run every expert over the current history.
pub fn panel(sequence: &[Outcome], observations: &[Observation]) -> Vec<ExpertVote> {
    vec![
        ExpertVote {
            name: "streak",
            vote: streak_expert(sequence),
        },
        ExpertVote {
            name: "alternation",
            vote: alternation_expert(sequence),
        },
        ExpertVote {
            name: "three-then-one",
            vote: three_then_one_expert(sequence),
        },
        ExpertVote {
            name: "frequency",
            vote: frequency_expert(sequence),
        },
        ExpertVote {
            name: "repeated-triple",
            vote: repeated_triple_expert(observations),
        },
        ExpertVote {
            name: "total-trend",
            vote: total_trend_expert(observations),
        },
        ExpertVote {
            name: "near-term",
            vote: near_term_expert(sequence),
        },
    ]
}

fn neutral(sequence: &[Outcome]) -> Vote {
    Vote::neutral(sequence.last().copied().unwrap_or(Outcome::High))
}

/// Follow a streak while it is young, fade it once it stretches.
fn streak_expert(sequence: &[Outcome]) -> Vote {
    let streak = current_streak(sequence);
    let Some(side) = streak.side else {
        return neutral(sequence);
    };
    if streak.len >= 6 {
        return Vote {
            outcome: side.opposite(),
            confidence: (60.0 + (streak.len - 6) as f64 * 3.0).min(72.0),
        };
    }
    if streak.len >= 3 {
        return Vote {
            outcome: side,
            confidence: (54.0 + streak.len as f64 * 5.0).min(78.0),
        };
    }
    neutral(sequence)
}

/// Perfect zigzag over the last 4..=8 outcomes continues.
fn alternation_expert(sequence: &[Outcome]) -> Vote {
    let n = sequence.len();
    if n < 4 {
        return neutral(sequence);
    }
    let mut alt_len = 1;
    for i in (n.saturating_sub(8) + 1..n).rev() {
        if sequence[i] != sequence[i - 1] {
            alt_len += 1;
        } else {
            break;
        }
    }
    if alt_len >= 4 {
        Vote {
            outcome: sequence[n - 1].opposite(),
            confidence: (60.0 + alt_len as f64 * 2.0).min(78.0),
        }
    } else {
        neutral(sequence)
    }
}

/// A triple broken by a single flip tends to keep the new side.
fn three_then_one_expert(sequence: &[Outcome]) -> Vote {
    let n = sequence.len();
    if n < 4 {
        return neutral(sequence);
    }
    let t = &sequence[n - 4..];
    if t[0] == t[1] && t[1] == t[2] && t[3] != t[2] {
        Vote {
            outcome: t[3],
            confidence: 68.0,
        }
    } else {
        neutral(sequence)
    }
}

/// Majority side over the last 20 when the imbalance is material.
fn frequency_expert(sequence: &[Outcome]) -> Vote {
    let n = sequence.len();
    if n < 8 {
        return neutral(sequence);
    }
    let window = &sequence[n.saturating_sub(20)..];
    let high = window.iter().filter(|&&o| o == Outcome::High).count() as i64;
    let low = window.len() as i64 - high;
    let imbalance = (high - low).abs();
    if imbalance >= 4 {
        Vote {
            outcome: if high > low { Outcome::High } else { Outcome::Low },
            confidence: (55.0 + imbalance as f64 * 2.0).min(75.0),
        }
    } else {
        neutral(sequence)
    }
}

/// When the latest dice combination has shown up before, lean toward
/// whatever historically followed it.
fn repeated_triple_expert(observations: &[Observation]) -> Vote {
    let n = observations.len();
    let outcomes: Vec<Outcome> = observations.iter().map(|o| o.outcome).collect();
    if n < 3 {
        return neutral(&outcomes);
    }
    let mut latest = observations[n - 1].dice;
    latest.sort_unstable();

    let mut high = 0i64;
    let mut low = 0i64;
    for i in 0..n - 1 {
        let mut dice = observations[i].dice;
        dice.sort_unstable();
        if dice == latest {
            match observations[i + 1].outcome {
                Outcome::High => high += 1,
                Outcome::Low => low += 1,
            }
        }
    }
    let diff = (high - low).abs();
    if high + low >= 2 && diff > 0 {
        Vote {
            outcome: if high > low { Outcome::High } else { Outcome::Low },
            confidence: (58.0 + diff as f64 * 6.0).min(76.0),
        }
    } else {
        neutral(&outcomes)
    }
}

/// Three consecutive strict increases (or decreases) in the dice total.
fn total_trend_expert(observations: &[Observation]) -> Vote {
    let outcomes: Vec<Outcome> = observations.iter().map(|o| o.outcome).collect();
    let n = observations.len();
    if n < 4 {
        return neutral(&outcomes);
    }
    let totals: Vec<u8> = observations[n - 4..].iter().map(|o| o.total).collect();
    let rising = totals.windows(2).all(|w| w[1] > w[0]);
    let falling = totals.windows(2).all(|w| w[1] < w[0]);
    if rising {
        Vote {
            outcome: Outcome::High,
            confidence: 66.0,
        }
    } else if falling {
        Vote {
            outcome: Outcome::Low,
            confidence: 66.0,
        }
    } else {
        neutral(&outcomes)
    }
}

/// Heavy one-sidedness of the last 10 rounds.
fn near_term_expert(sequence: &[Outcome]) -> Vote {
    let n = sequence.len();
    if n < 10 {
        return neutral(sequence);
    }
    let window = &sequence[n - 10..];
    let high = window.iter().filter(|&&o| o == Outcome::High).count();
    if high >= 7 {
        Vote {
            outcome: Outcome::High,
            confidence: 64.0,
        }
    } else if high <= 3 {
        Vote {
            outcome: Outcome::Low,
            confidence: 64.0,
        }
    } else {
        neutral(sequence)
    }
}
