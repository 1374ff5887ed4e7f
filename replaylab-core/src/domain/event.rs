//! TradeEvent — lightweight entry/exit representation for the event path.

use super::ids::TemplateId;
use super::intent::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entry or exit. `Exit` sorts before `Entry`: capital freed by a close at
/// timestamp T must be available to size an entry at T.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Exit,
    Entry,
}

impl EventKind {
    /// Sort priority at a shared timestamp: EXIT=0, ENTRY=1.
    pub fn priority(self) -> u8 {
        match self {
            EventKind::Exit => 0,
            EventKind::Entry => 1,
        }
    }
}

/// A single timestamped trade event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub ts: DateTime<Utc>,
    pub kind: EventKind,
    pub symbol: String,
    pub template_id: TemplateId,
    pub side: Side,
    pub price: f64,
}

impl TradeEvent {
    /// Total, shuffle-invariant sort key.
    pub fn sort_key(&self) -> (DateTime<Utc>, u8, &str, &str, Side) {
        (
            self.ts,
            self.kind.priority(),
            &self.symbol,
            self.template_id.as_str(),
            self.side,
        )
    }
}
