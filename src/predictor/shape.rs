//! Shape and sliding-window pattern detection
//!
//! Recognizes the named table patterns (streaks, alternation, 2-2, 2-1,
//! 2-3) plus a self-similarity vote from recurring history windows.
//! Votes are additive per side; the analysis converts them to a
//! probability with a two-class softmax so large score imbalances
//! saturate while small ones stay near neutral.

use crate::types::Outcome;

const STREAK_MIN: usize = 3;
const STREAK_BASE: f64 = 12.0;
const STREAK_STEP: f64 = 2.5;
const STREAK_CAP: f64 = 28.0;
const ALTERNATION_SCORE: f64 = 18.0;
const DOUBLE_PAIR_SCORE: f64 = 12.0;
const TWO_ONE_SCORE: f64 = 10.0;
const TWO_THREE_SCORE: f64 = 14.0;
const WINDOW_MAX: usize = 6;
const WINDOW_FOLLOWER_SCORE: f64 = 2.0;
const SOFTMAX_TEMPERATURE: f64 = 12.0;

const NO_DATA_LABEL: &str = "no data";
const NO_PATTERN_LABEL: &str = "no clear pattern";

/// Current run of identical outcomes ending at the most recent one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Streak {
    pub len: usize,
    pub side: Option<Outcome>,
}

pub fn current_streak(sequence: &[Outcome]) -> Streak {
    let Some(&last) = sequence.last() else {
        return Streak { len: 0, side: None };
    };
    let len = sequence.iter().rev().take_while(|&&o| o == last).count();
    Streak {
        len,
        side: Some(last),
    }
}

/// Result of one shape analysis pass.
#[derive(Debug, Clone)]
pub struct ShapeAnalysis {
    pub labels: Vec<String>,
    pub vote_high: f64,
    pub vote_low: f64,
    /// Number of historical window recurrences backing the vote.
    pub window_matches: u32,
}

impl ShapeAnalysis {
    /// Probability of `High` implied by the additive votes.
    pub fn prob_high(&self) -> f64 {
        if self.vote_high == 0.0 && self.vote_low == 0.0 {
            return 0.5;
        }
        softmax2(self.vote_high, self.vote_low, SOFTMAX_TEMPERATURE)
    }

    /// Labels that represent an actual detected pattern (used by the
    /// combiner's agreement boost).
    pub fn clear_label_count(&self) -> usize {
        self.labels
            .iter()
            .filter(|l| l.as_str() != NO_PATTERN_LABEL && l.as_str() != NO_DATA_LABEL)
            .count()
    }
}

/// Two-class softmax over raw score difference.
fn softmax2(score_a: f64, score_b: f64, temperature: f64) -> f64 {
    let ea = (score_a / temperature).exp();
    let eb = (score_b / temperature).exp();
    ea / (ea + eb)
}

/// Run the full shape analysis over an outcome sequence.
pub fn analyze(sequence: &[Outcome]) -> ShapeAnalysis {
    use Outcome::{High, Low};

    let mut labels = Vec::new();
    let mut vote_high = 0.0;
    let mut vote_low = 0.0;
    let n = sequence.len();

    if n == 0 {
        return ShapeAnalysis {
            labels: vec![NO_DATA_LABEL.to_string()],
            vote_high,
            vote_low,
            window_matches: 0,
        };
    }

    let mut add = |side: Outcome, score: f64, high: &mut f64, low: &mut f64| match side {
        High => *high += score,
        Low => *low += score,
    };

    // Streak: continuation bias, score grows with length up to a cap.
    let streak = current_streak(sequence);
    if let (true, Some(side)) = (streak.len >= STREAK_MIN, streak.side) {
        labels.push(format!("streak {} ({})", side, streak.len));
        let score = (STREAK_BASE + (streak.len - STREAK_MIN) as f64 * STREAK_STEP).min(STREAK_CAP);
        add(side, score, &mut vote_high, &mut vote_low);
    }

    // 1-1 alternation: continue the zigzag, i.e. the opposite of last.
    if n >= 4 {
        let tail = &sequence[n - 4..];
        if tail == [High, Low, High, Low] || tail == [Low, High, Low, High] {
            labels.push("alternating 1-1".to_string());
            let next = sequence[n - 1].opposite();
            add(next, ALTERNATION_SCORE, &mut vote_high, &mut vote_low);
        }
    }

    // 2-2 double pair: expect the reversal to keep cycling.
    if n >= 4 {
        let tail = &sequence[n - 4..];
        if tail == [High, High, Low, Low] {
            labels.push("pattern 2-2".to_string());
            add(High, DOUBLE_PAIR_SCORE, &mut vote_high, &mut vote_low);
        } else if tail == [Low, Low, High, High] {
            labels.push("pattern 2-2".to_string());
            add(Low, DOUBLE_PAIR_SCORE, &mut vote_high, &mut vote_low);
        }
    }

    // 2-1: pair then single, expect a return to the pair side.
    if n >= 3 {
        let tail = &sequence[n - 3..];
        if tail == [High, High, Low] {
            labels.push("pattern 2-1".to_string());
            add(High, TWO_ONE_SCORE, &mut vote_high, &mut vote_low);
        } else if tail == [Low, Low, High] {
            labels.push("pattern 2-1".to_string());
            add(Low, TWO_ONE_SCORE, &mut vote_high, &mut vote_low);
        }
    }

    // 2-3: pair then triple, ride the longer leg.
    if n >= 5 {
        let tail = &sequence[n - 5..];
        if tail == [High, High, Low, Low, Low] {
            labels.push("pattern 2-3".to_string());
            add(Low, TWO_THREE_SCORE, &mut vote_high, &mut vote_low);
        } else if tail == [Low, Low, High, High, High] {
            labels.push("pattern 2-3".to_string());
            add(High, TWO_THREE_SCORE, &mut vote_high, &mut vote_low);
        }
    }

    // Sliding-window self-similarity: find earlier windows identical to
    // the most recent one and tally what followed them.
    let (follow_high, follow_low) = sliding_window_votes(sequence, WINDOW_MAX);
    vote_high += follow_high as f64 * WINDOW_FOLLOWER_SCORE;
    vote_low += follow_low as f64 * WINDOW_FOLLOWER_SCORE;
    let window_matches = follow_high + follow_low;
    if window_matches > 0 {
        labels.push(format!("window recurrence {}H/{}L", follow_high, follow_low));
    }

    if labels.is_empty() {
        labels.push(NO_PATTERN_LABEL.to_string());
    }

    ShapeAnalysis {
        labels,
        vote_high,
        vote_low,
        window_matches,
    }
}

/// Follower tallies for every window size 2..=`max_window` whose most
/// recent window recurs earlier in the sequence.
fn sliding_window_votes(sequence: &[Outcome], max_window: usize) -> (u32, u32) {
    let n = sequence.len();
    let mut high = 0u32;
    let mut low = 0u32;
    for w in 2..=max_window {
        if n <= w {
            continue;
        }
        let recent = &sequence[n - w..];
        for i in 0..n - w {
            if &sequence[i..i + w] == recent {
                match sequence[i + w] {
                    Outcome::High => high += 1,
                    Outcome::Low => low += 1,
                }
            }
        }
    }
    (high, low)
}
