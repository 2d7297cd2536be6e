/// Data structures for the relay: the pending slot and history entries
use crate::pgn::{GameResult, GameSummary};
use serde::{Deserialize, Serialize};

/// The single payload waiting to be delivered to the destination page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransfer {
    pub payload: String,
    /// Milliseconds since the epoch
    pub created_at: f64,
}

impl PendingTransfer {
    pub fn new(payload: String, created_at: f64) -> PendingTransfer {
        PendingTransfer { payload, created_at }
    }

    pub fn age_ms(&self, now: f64) -> f64 {
        now - self.created_at
    }

    /// Strictly older than the TTL; an age equal to the TTL is still live
    pub fn is_expired(&self, now: f64, ttl_ms: f64) -> bool {
        self.age_ms(now) > ttl_ms
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Players {
    pub white: String,
    pub black: String,
}

/// A game captured from the origin site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: u64,
    /// ISO-8601
    pub created_at: String,
    pub payload: String,
    pub players: Players,
    pub result: GameResult,
    #[serde(default = "default_event")]
    pub event: String,
    pub source_label: String,
    pub origin_url: String,
}

fn default_event() -> String {
    "Game".to_string()
}

impl HistoryEntry {
    /// Build an entry from a normalized PGN, reading players and result from its headers
    pub fn from_pgn(
        id: u64,
        created_at: String,
        payload: String,
        source_label: &str,
        origin_url: &str,
    ) -> HistoryEntry {
        let summary = GameSummary::from_pgn(&payload);
        HistoryEntry {
            id,
            created_at,
            payload,
            players: Players {
                white: summary.white,
                black: summary.black,
            },
            result: summary.result,
            event: summary.event,
            source_label: source_label.to_string(),
            origin_url: origin_url.to_string(),
        }
    }
}
