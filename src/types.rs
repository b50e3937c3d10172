//! Core domain types
//!
//! An `Observation` is one settled game round (three dice, their total,
//! and the high/low outcome). The predictor only ever consumes the
//! derived `Outcome` sequence plus the raw dice history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Threshold for a high roll: three-dice total of 11..=18.
pub const HIGH_THRESHOLD: u8 = 11;

/// Binary round outcome. `High` is Tài (total >= 11), `Low` is Xỉu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    High,
    Low,
}

impl Outcome {
    pub fn from_total(total: u8) -> Self {
        if total >= HIGH_THRESHOLD {
            Outcome::High
        } else {
            Outcome::Low
        }
    }

    /// Compact single-char encoding used in pattern strings.
    ///
    /// Uses the Vietnamese initials ('T' = Tài/high, 'X' = Xỉu/low) so
    /// stored pattern strings stay compatible with the upstream feed's
    /// conventions.
    pub fn as_char(self) -> char {
        match self {
            Outcome::High => 'T',
            Outcome::Low => 'X',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'T' | 't' => Some(Outcome::High),
            'X' | 'x' => Some(Outcome::Low),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Outcome::High => Outcome::Low,
            Outcome::Low => Outcome::High,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::High => write!(f, "High"),
            Outcome::Low => write!(f, "Low"),
        }
    }
}

/// One settled game round as received from the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Monotonic session identifier from the feed.
    pub session: u64,
    /// The three dice faces, each 1..=6.
    pub dice: [u8; 3],
    /// Dice total (3..=18).
    pub total: u8,
    pub outcome: Outcome,
    pub time: DateTime<Utc>,
}

impl Observation {
    pub fn new(session: u64, dice: [u8; 3], time: DateTime<Utc>) -> Self {
        let total = dice.iter().sum();
        Self {
            session,
            dice,
            total,
            outcome: Outcome::from_total(total),
            time,
        }
    }
}

/// A single model's directional vote with its own confidence (0-100).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    pub outcome: Outcome,
    /// Confidence percentage; 50 means "no signal".
    pub confidence: f64,
}

impl Vote {
    pub fn neutral(outcome: Outcome) -> Self {
        Self {
            outcome,
            confidence: 50.0,
        }
    }

    /// Probability of `High` implied by this vote.
    pub fn prob_high(&self) -> f64 {
        match self.outcome {
            Outcome::High => self.confidence / 100.0,
            Outcome::Low => 1.0 - self.confidence / 100.0,
        }
    }
}

/// Per-component probabilities of `High` feeding the final blend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComponentProbs {
    pub markov: f64,
    pub shape: f64,
    pub local_freq: f64,
    pub global_freq: f64,
    pub bayes: f64,
    pub monte_carlo: f64,
    pub cascade: f64,
    pub dictionary: f64,
}

/// Final ensemble output for one prediction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub prediction: Outcome,
    /// Calibrated confidence percentage, always within the operating band.
    pub confidence: f64,
    pub components: ComponentProbs,
    /// Shape labels detected this round (streaks, named patterns).
    pub labels: Vec<String>,
    /// Human-readable rationale, one clause per component.
    pub explain: String,
}
