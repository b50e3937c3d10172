//! Round ingestion
//!
//! Polls a remote feed for the latest settled round, tolerating the
//! loose key variants the upstream API is known to emit, and folds new
//! rounds into the store. This is the single writer of persistent
//! state: scoring of the previous prediction, learned-pattern updates,
//! and snapshot saves all happen on this path.

use crate::error::{PredictorError, Result};
use crate::storage::SharedStore;
use crate::types::{Observation, Outcome};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// One settled round as reported by a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundPayload {
    pub session: u64,
    pub dice: [u8; 3],
    pub total: u8,
    pub outcome: Outcome,
}

impl RoundPayload {
    pub fn into_observation(self) -> Observation {
        Observation {
            session: self.session,
            dice: self.dice,
            total: self.total,
            outcome: self.outcome,
            time: Utc::now(),
        }
    }
}

/// A source of settled rounds.
#[async_trait]
pub trait RoundSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<RoundPayload>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// HTTP feed source.
pub struct HttpRoundSource {
    http: Client,
    url: String,
}

impl HttpRoundSource {
    pub fn new(url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(9))
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl RoundSource for HttpRoundSource {
    async fn fetch_latest(&self) -> Result<RoundPayload> {
        let body: Value = self.http.get(&self.url).send().await?.json().await?;
        parse_payload(&body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Map a feed payload to a round, probing the key spellings the
/// upstream API has used over time.
pub fn parse_payload(body: &Value) -> Result<RoundPayload> {
    // Some deployments wrap the round in a one-element array.
    let body = match body.as_array() {
        Some(items) => items
            .first()
            .ok_or_else(|| PredictorError::InvalidPayload("empty array".into()))?,
        None => body,
    };

    let session = probe(body, &["Phien", "phien", "session", "id"])
        .and_then(as_u64)
        .ok_or_else(|| PredictorError::InvalidPayload("missing session id".into()))?;

    let dice = parse_dice(body);
    let dice_total: u8 = dice.iter().sum();

    let total = probe(body, &["Tong", "tong", "total"])
        .and_then(as_u64)
        .map(|t| t as u8)
        .or_else(|| if dice_total > 0 { Some(dice_total) } else { None });

    let raw_result = probe(body, &["Ket_qua", "ket_qua", "result", "ketqua"])
        .and_then(Value::as_str)
        .map(normalize_result);

    let outcome = match (raw_result.flatten(), total) {
        (Some(outcome), _) => outcome,
        (None, Some(t)) => Outcome::from_total(t),
        (None, None) => {
            return Err(PredictorError::InvalidPayload(
                "neither result nor total present".into(),
            ))
        }
    };

    Ok(RoundPayload {
        session,
        dice,
        total: total.unwrap_or(dice_total),
        outcome,
    })
}

fn parse_dice(body: &Value) -> [u8; 3] {
    let keyed = [
        probe(body, &["Xuc_xac_1", "xuc_xac_1", "x1", "dice1"]),
        probe(body, &["Xuc_xac_2", "xuc_xac_2", "x2", "dice2"]),
        probe(body, &["Xuc_xac_3", "xuc_xac_3", "x3", "dice3"]),
    ];
    if keyed.iter().all(|v| v.is_some()) {
        let mut dice = [0u8; 3];
        for (slot, value) in keyed.iter().enumerate() {
            dice[slot] = value.and_then(as_u64).unwrap_or(0) as u8;
        }
        return dice;
    }
    if let Some(arr) = body.get("dice").and_then(Value::as_array) {
        if arr.len() >= 3 {
            let mut dice = [0u8; 3];
            for (slot, value) in arr.iter().take(3).enumerate() {
                dice[slot] = as_u64(value).unwrap_or(0) as u8;
            }
            return dice;
        }
    }
    [0, 0, 0]
}

fn probe<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| body.get(k)).filter(|v| !v.is_null())
}

/// Accept numbers and numeric strings for ids and faces.
fn as_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn normalize_result(raw: &str) -> Option<Outcome> {
    let s = raw.to_lowercase();
    if s.contains('t') {
        Some(Outcome::High)
    } else if s.contains('x') {
        Some(Outcome::Low)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollReport {
    pub session: u64,
    pub accepted: bool,
}

/// Fetch once and ingest if the round is new.
pub async fn poll_once(source: &dyn RoundSource, store: &SharedStore) -> Result<PollReport> {
    let payload = source.fetch_latest().await?;
    let session = payload.session;
    let outcome = payload.outcome;

    let accepted = {
        let mut guard = store.write();
        let accepted = guard.ingest(payload.into_observation());
        if accepted {
            guard.save()?;
        }
        accepted
    };

    if accepted {
        tracing::info!(session, %outcome, "ingested round from {}", source.name());
    } else {
        tracing::debug!(session, "no new round");
    }
    Ok(PollReport { session, accepted })
}

/// Poll forever at a fixed cadence. Errors are logged, never fatal.
pub async fn run(source: Arc<dyn RoundSource>, store: SharedStore, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = poll_once(source.as_ref(), &store).await {
            tracing::warn!("poll failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use parking_lot::RwLock;
    use serde_json::json;

    #[test]
    fn test_parse_canonical_payload() {
        let body = json!({
            "Phien": 14532,
            "Xuc_xac_1": 2,
            "Xuc_xac_2": 5,
            "Xuc_xac_3": 6,
            "Tong": 13,
            "Ket_qua": "Tài"
        });
        let round = parse_payload(&body).unwrap();
        assert_eq!(round.session, 14532);
        assert_eq!(round.dice, [2, 5, 6]);
        assert_eq!(round.total, 13);
        assert_eq!(round.outcome, Outcome::High);
    }

    #[test]
    fn test_parse_lowercase_and_string_session() {
        let body = json!({
            "phien": "887",
            "xuc_xac_1": 1,
            "xuc_xac_2": 2,
            "xuc_xac_3": 3,
            "ket_qua": "Xỉu"
        });
        let round = parse_payload(&body).unwrap();
        assert_eq!(round.session, 887);
        assert_eq!(round.total, 6);
        assert_eq!(round.outcome, Outcome::Low);
    }

    #[test]
    fn test_parse_dice_array_and_total_fallback() {
        // No result string: outcome derived from the total rule.
        let body = json!({
            "session": 5,
            "dice": [4, 4, 4]
        });
        let round = parse_payload(&body).unwrap();
        assert_eq!(round.dice, [4, 4, 4]);
        assert_eq!(round.total, 12);
        assert_eq!(round.outcome, Outcome::High);
    }

    #[test]
    fn test_parse_wrapped_array() {
        let body = json!([{ "id": 9, "total": 4 }]);
        let round = parse_payload(&body).unwrap();
        assert_eq!(round.session, 9);
        assert_eq!(round.outcome, Outcome::Low);
    }

    #[test]
    fn test_parse_rejects_incomplete() {
        assert!(parse_payload(&json!({})).is_err());
        assert!(parse_payload(&json!({ "Phien": 3 })).is_err());
        assert!(parse_payload(&json!([])).is_err());
    }

    struct FixedSource {
        payload: RoundPayload,
    }

    #[async_trait]
    impl RoundSource for FixedSource {
        async fn fetch_latest(&self) -> Result<RoundPayload> {
            Ok(self.payload.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_poll_once_ingests_then_dedupes() {
        let store: SharedStore = Arc::new(RwLock::new(Store::new()));
        let source = FixedSource {
            payload: RoundPayload {
                session: 42,
                dice: [6, 6, 6],
                total: 18,
                outcome: Outcome::High,
            },
        };

        let report = poll_once(&source, &store).await.unwrap();
        assert!(report.accepted);
        assert_eq!(store.read().len(), 1);

        // Same session again: ignored.
        let report = poll_once(&source, &store).await.unwrap();
        assert!(!report.accepted);
        assert_eq!(store.read().len(), 1);
    }
}
