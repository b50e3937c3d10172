//! Baked pattern-template dictionary
//!
//! A fixed table of 416 length-10 outcome strings, each mapped to a
//! precomputed prediction, confidence, and rationale. Only structurally
//! recognizable tails are baked (streak, long alternation, double pair,
//! three-then-one), so most histories do not match and fall through to
//! the later correction rules. Built once at startup by a deterministic
//! rule set; never mutated afterwards.

use crate::types::Outcome;
use std::collections::HashMap;

/// Fixed key length of every dictionary entry.
pub const TEMPLATE_LEN: usize = 10;

#[derive(Debug, Clone)]
pub struct TemplateEntry {
    pub prediction: Outcome,
    pub confidence: f64,
    pub rationale: &'static str,
}

pub struct TemplateDictionary {
    entries: HashMap<String, TemplateEntry>,
}

impl TemplateDictionary {
    /// Build the full table. Deterministic: same entries every run.
    pub fn build() -> Self {
        let mut entries = HashMap::new();
        for bits in 0u32..(1 << TEMPLATE_LEN) {
            let key: String = (0..TEMPLATE_LEN)
                .map(|i| {
                    if bits >> (TEMPLATE_LEN - 1 - i) & 1 == 1 {
                        'T'
                    } else {
                        'X'
                    }
                })
                .collect();
            if let Some(entry) = bake(&key) {
                entries.insert(key, entry);
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup of one key.
    pub fn get(&self, key: &str) -> Option<&TemplateEntry> {
        self.entries.get(key)
    }

    /// Match the tail of a pattern string against the baked keys.
    pub fn lookup_suffix(&self, pattern: &str) -> Option<&TemplateEntry> {
        if pattern.len() < TEMPLATE_LEN {
            return None;
        }
        self.entries.get(&pattern[pattern.len() - TEMPLATE_LEN..])
    }
}

/// Bake one key's verdict, or `None` when the tail has no recognizable
/// structure.
fn bake(key: &str) -> Option<TemplateEntry> {
    let outcomes: Vec<Outcome> = key.chars().filter_map(Outcome::from_char).collect();
    let n = outcomes.len();
    let last = outcomes[n - 1];
    let run = outcomes.iter().rev().take_while(|&&o| o == last).count();

    // Streak tail: ride it while fresh, fade it once stretched thin.
    if run >= 7 {
        return Some(TemplateEntry {
            prediction: last.opposite(),
            confidence: 82.0,
            rationale: "streak exhaustion",
        });
    }
    if run >= 4 {
        return Some(TemplateEntry {
            prediction: last,
            confidence: 76.0 + (run - 4) as f64 * 2.0,
            rationale: "ride streak",
        });
    }

    // Long alternating tail: keep the zigzag going.
    if alternation_tail_len(&outcomes) >= 6 {
        return Some(TemplateEntry {
            prediction: last.opposite(),
            confidence: 85.0,
            rationale: "alternating run",
        });
    }

    let t = &outcomes[n - 4..];

    // Double pair (AABB): expect the cycle to flip back.
    if t[0] == t[1] && t[2] == t[3] && t[1] != t[2] {
        return Some(TemplateEntry {
            prediction: last.opposite(),
            confidence: 74.0,
            rationale: "double pair cycle",
        });
    }

    // Three-then-one (AAAB): the fresh break tends to hold.
    if t[0] == t[1] && t[1] == t[2] && t[3] != t[2] {
        return Some(TemplateEntry {
            prediction: last,
            confidence: 70.0,
            rationale: "fresh break",
        });
    }

    None
}

/// Length of the perfectly alternating suffix.
fn alternation_tail_len(outcomes: &[Outcome]) -> usize {
    if outcomes.len() < 2 {
        return outcomes.len();
    }
    let mut len = 1;
    for i in (1..outcomes.len()).rev() {
        if outcomes[i] != outcomes[i - 1] {
            len += 1;
        } else {
            break;
        }
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_count() {
        // 128 streak tails + 32 long alternations + 128 double pairs +
        // 128 three-then-one tails.
        let dict = TemplateDictionary::build();
        assert_eq!(dict.len(), 416);
    }

    #[test]
    fn test_alternating_key_flips() {
        let dict = TemplateDictionary::build();
        let entry = dict.get("TXTXTXTXTX").unwrap();
        assert_eq!(entry.prediction, Outcome::High); // last is X
        assert_eq!(entry.rationale, "alternating run");
    }

    #[test]
    fn test_medium_streak_rides() {
        let dict = TemplateDictionary::build();
        let entry = dict.get("TXTXXTTTTT").unwrap();
        assert_eq!(entry.prediction, Outcome::High);
        assert_eq!(entry.rationale, "ride streak");
        assert_eq!(entry.confidence, 78.0); // run of 5
    }

    #[test]
    fn test_exhausted_streak_breaks() {
        let dict = TemplateDictionary::build();
        let entry = dict.get("TXXXXXXXXX").unwrap();
        assert_eq!(entry.prediction, Outcome::High);
        assert_eq!(entry.rationale, "streak exhaustion");
    }

    #[test]
    fn test_double_pair_and_fresh_break() {
        let dict = TemplateDictionary::build();
        let entry = dict.get("TXTXTXTTXX").unwrap();
        assert_eq!(entry.rationale, "double pair cycle");
        assert_eq!(entry.prediction, Outcome::High);

        let entry = dict.get("TXTXTXXXXT").unwrap();
        assert_eq!(entry.rationale, "fresh break");
        assert_eq!(entry.prediction, Outcome::High);
    }

    #[test]
    fn test_unstructured_tail_absent() {
        let dict = TemplateDictionary::build();
        assert!(dict.get("TXXTTXTXXT").is_none());
        assert!(dict.lookup_suffix("TXT").is_none());
    }

    #[test]
    fn test_suffix_lookup_uses_tail() {
        let dict = TemplateDictionary::build();
        let long_pattern = "XXXXXXXXXXTXTXTXTXTX";
        let by_suffix = dict.lookup_suffix(long_pattern).unwrap();
        assert_eq!(by_suffix.rationale, "alternating run");
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = TemplateDictionary::build();
        let b = TemplateDictionary::build();
        assert_eq!(a.len(), b.len());
        for key in ["TXTXXTTTTT", "TXTXTXTTXX"] {
            let ea = a.get(key).unwrap();
            let eb = b.get(key).unwrap();
            assert_eq!(ea.prediction, eb.prediction);
            assert_eq!(ea.confidence, eb.confidence);
        }
    }
}
