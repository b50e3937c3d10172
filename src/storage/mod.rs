//! Persistent store for history and learned state
//!
//! Owns the observation ring, the compact pattern string, the Markov
//! tables, and the cascade's learned state. All mutation funnels through
//! `ingest`, which keeps the single-writer discipline; prediction takes
//! the same lock only for its narrow learned-state write-back.
//!
//! Persistence is a single JSON snapshot written atomically
//! (temp file + rename). Markov tables are rebuilt from the snapshot's
//! history on load rather than persisted.

use crate::error::Result;
use crate::predictor::cascade::{break_confirm_face, BreakAttempt, LearnedState};
use crate::predictor::{Ensemble, MarkovEnsemble};
use crate::types::{EnsembleResult, Observation, Outcome};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maximum retained observations.
pub const MAX_HISTORY: usize = 500;
/// Maximum retained pattern characters (independent of the ring cap).
pub const MAX_PATTERN_LEN: usize = 1000;

pub type SharedStore = Arc<RwLock<Store>>;

/// Most recent prediction, kept so the next settled round can score it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPrediction {
    pub outcome: Outcome,
    /// 3-outcome tail at prediction time, feeding the error memory.
    pub tail3: Option<String>,
}

/// Serialized snapshot layout of `Store`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    history: Vec<Observation>,
    pattern: String,
    learned: LearnedState,
    pending: Option<PendingPrediction>,
}

pub struct Store {
    history: VecDeque<Observation>,
    pattern: String,
    learned: LearnedState,
    markov: MarkovEnsemble,
    pending: Option<PendingPrediction>,
    data_file: Option<PathBuf>,
}

/// Aggregate counters exposed by the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_samples: usize,
    pub high_count: usize,
    pub low_count: usize,
    pub current_streak: usize,
    pub streak_side: Option<Outcome>,
    pub recent10_high: usize,
    pub recent10_low: usize,
    pub last_session: Option<u64>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            history: VecDeque::new(),
            pattern: String::new(),
            learned: LearnedState::default(),
            markov: MarkovEnsemble::new(),
            pending: None,
            data_file: None,
        }
    }

    /// Open the store backed by a snapshot file, loading it if present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self::new();
        store.data_file = Some(path.clone());

        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Snapshot>(&raw) {
                Ok(snapshot) => store.restore(snapshot),
                Err(e) => {
                    // A corrupt snapshot must not take the service down;
                    // start fresh and let polling repopulate.
                    tracing::warn!("snapshot {} unreadable ({}), starting empty", path.display(), e);
                }
            }
        }
        Ok(store)
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.history = snapshot.history.into_iter().collect();
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
        self.pattern = snapshot.pattern;
        if self.pattern.len() > MAX_PATTERN_LEN {
            self.pattern = self.pattern[self.pattern.len() - MAX_PATTERN_LEN..].to_string();
        }
        self.learned = snapshot.learned;
        self.pending = snapshot.pending;
        let sequence = self.sequence();
        self.markov.rebuild(&sequence);
        tracing::info!(
            "restored {} observations, {} learned patterns",
            self.history.len(),
            self.learned.pattern_memory.len()
        );
    }

    /// Write the snapshot atomically next to its final location.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };
        let snapshot = Snapshot {
            history: self.history.iter().cloned().collect(),
            pattern: self.pattern.clone(),
            learned: self.learned.clone(),
            pending: self.pending.clone(),
        };
        let raw = serde_json::to_string(&snapshot)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Accept a settled round if it is newer than everything seen.
    /// Returns false for duplicates and stale sessions.
    pub fn ingest(&mut self, obs: Observation) -> bool {
        if let Some(last) = self.history.back() {
            if obs.session <= last.session {
                return false;
            }
        }

        // Score the outstanding prediction before anything else mutates.
        if let Some(pending) = self.pending.take() {
            self.learned
                .record_result(pending.tail3.as_deref(), pending.outcome, obs.outcome);
        }

        // Fold the settled outcome into the learned pattern store using
        // the pattern as it stood *before* this round.
        self.learned.observe(&self.pattern, obs.outcome);

        // Break-flag housekeeping: a confirming face or a flipped side
        // ends the corresponding probe cycle.
        for side in [Outcome::High, Outcome::Low] {
            if obs.dice.contains(&break_confirm_face(side)) {
                self.learned.break_flags.set(side, BreakAttempt::Idle);
            }
        }
        self.learned
            .break_flags
            .set(obs.outcome.opposite(), BreakAttempt::Idle);

        self.pattern.push(obs.outcome.as_char());
        if self.pattern.len() > MAX_PATTERN_LEN {
            self.pattern = self.pattern[self.pattern.len() - MAX_PATTERN_LEN..].to_string();
        }

        self.history.push_back(obs);
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }

        let sequence = self.sequence();
        self.markov.update(&sequence);
        true
    }

    /// Run the ensemble against the current state and remember the
    /// prediction for later scoring.
    pub fn predict_next(&mut self, ensemble: &Ensemble) -> EnsembleResult {
        let observations: Vec<Observation> = self.history.iter().cloned().collect();
        let pattern = self.pattern.clone();
        let result = ensemble.predict(&observations, &pattern, &self.markov, &mut self.learned);
        let tail3 = if self.pattern.len() >= 3 {
            Some(self.pattern[self.pattern.len() - 3..].to_string())
        } else {
            None
        };
        self.pending = Some(PendingPrediction {
            outcome: result.prediction,
            tail3,
        });
        result
    }

    /// Drop everything: history, pattern, learned state, tables.
    pub fn reset(&mut self) -> Result<()> {
        self.history.clear();
        self.pattern.clear();
        self.learned = LearnedState::default();
        self.markov.reset();
        self.pending = None;
        self.save()
    }

    pub fn sequence(&self) -> Vec<Outcome> {
        self.history.iter().map(|o| o.outcome).collect()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn last_session(&self) -> Option<u64> {
        self.history.back().map(|o| o.session)
    }

    pub fn latest(&self) -> Option<&Observation> {
        self.history.back()
    }

    /// Most recent `limit` observations, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<Observation> {
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn stats(&self) -> StoreStats {
        let sequence = self.sequence();
        let high_count = sequence.iter().filter(|&&o| o == Outcome::High).count();
        let streak = crate::predictor::current_streak(&sequence);
        let recent10: Vec<Outcome> = sequence.iter().rev().take(10).copied().collect();
        let recent10_high = recent10.iter().filter(|&&o| o == Outcome::High).count();
        StoreStats {
            total_samples: sequence.len(),
            high_count,
            low_count: sequence.len() - high_count,
            current_streak: streak.len,
            streak_side: streak.side,
            recent10_high,
            recent10_low: recent10.len() - recent10_high,
            last_session: self.last_session(),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn obs(session: u64, dice: [u8; 3]) -> Observation {
        Observation::new(session, dice, Utc::now())
    }

    #[test]
    fn test_ingest_dedupes_by_session() {
        let mut store = Store::new();
        assert!(store.ingest(obs(10, [6, 6, 6])));
        assert!(!store.ingest(obs(10, [1, 1, 1])));
        assert!(!store.ingest(obs(9, [1, 1, 1])));
        assert!(store.ingest(obs(11, [1, 1, 1])));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_pattern_tracks_history() {
        let mut store = Store::new();
        store.ingest(obs(1, [6, 6, 6]));
        store.ingest(obs(2, [1, 1, 1]));
        store.ingest(obs(3, [5, 5, 5]));
        assert_eq!(store.pattern(), "TXT");
    }

    #[test]
    fn test_pattern_suffix_reproducible_from_ring_tail() {
        // Invariant: the pattern's suffix must always re-derive from
        // the observation ring's tail.
        let mut store = Store::new();
        for i in 0..40 {
            let dice = if i % 3 == 0 { [6, 6, 6] } else { [1, 1, 2] };
            store.ingest(obs(i as u64 + 1, dice));
        }
        let derived: String = store
            .sequence()
            .iter()
            .map(|o| o.as_char())
            .collect();
        assert!(store.pattern().ends_with(&derived));
    }

    #[test]
    fn test_history_ring_bounded() {
        let mut store = Store::new();
        for i in 0..(MAX_HISTORY + 50) {
            store.ingest(obs(i as u64 + 1, [2, 3, 4]));
        }
        assert_eq!(store.len(), MAX_HISTORY);
        // Oldest entries dropped, newest kept.
        assert_eq!(store.last_session(), Some((MAX_HISTORY + 50) as u64));
    }

    #[test]
    fn test_prediction_scoring_updates_miss_streak() {
        let mut store = Store::new();
        let ensemble = Ensemble::new(100);
        store.ingest(obs(1, [6, 6, 6]));
        store.ingest(obs(2, [6, 5, 6]));

        let result = store.predict_next(&ensemble);
        // Force the next round against the prediction.
        let wrong_dice = match result.prediction {
            Outcome::High => [1, 1, 2],
            Outcome::Low => [6, 6, 6],
        };
        store.ingest(obs(3, wrong_dice));
        assert_eq!(store.learned.miss_streak, 1);

        // A correct round resets the streak.
        let right = store.predict_next(&ensemble);
        let right_dice = match right.prediction {
            Outcome::High => [6, 6, 6],
            Outcome::Low => [1, 1, 2],
        };
        store.ingest(obs(4, right_dice));
        assert_eq!(store.learned.miss_streak, 0);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        {
            let mut store = Store::open(&path).unwrap();
            for i in 0..25 {
                let dice = if i % 2 == 0 { [6, 6, 6] } else { [1, 2, 1] };
                store.ingest(obs(i as u64 + 1, dice));
            }
            store.save().unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.len(), 25);
        assert_eq!(store.pattern().len(), 25);
        assert!(!store.learned.pattern_memory.is_empty());
        // Markov rebuilt from history on load.
        let seq = store.sequence();
        assert!(store.markov.predict(&seq).support > 0);
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = Store::open(&path).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_reset_clears_all_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let mut store = Store::open(&path).unwrap();
        for i in 0..10 {
            store.ingest(obs(i as u64 + 1, [6, 6, 6]));
        }
        store.reset().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.pattern(), "");
        assert!(store.learned.pattern_memory.is_empty());

        let reloaded = Store::open(&path).unwrap();
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_confirming_face_resets_break_flag() {
        let mut store = Store::new();
        store.learned.break_flags.high = BreakAttempt::Attempted;
        // Face 1 confirms the High-side break.
        store.ingest(obs(1, [1, 5, 6]));
        assert_eq!(store.learned.break_flags.high, BreakAttempt::Idle);
    }

    #[test]
    fn test_stats() {
        let mut store = Store::new();
        store.ingest(obs(1, [6, 6, 6]));
        store.ingest(obs(2, [6, 5, 6]));
        store.ingest(obs(3, [1, 1, 1]));
        let stats = store.stats();
        assert_eq!(stats.total_samples, 3);
        assert_eq!(stats.high_count, 2);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.streak_side, Some(Outcome::Low));
        assert_eq!(stats.last_session, Some(3));
    }
}
