//! Trade — one template's entry fill paired with its exit fill.

use super::ids::TemplateId;
use super::intent::{Side, ValidToReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exit reason carried on a trade row. An observed reason comes from the exit
/// fill; a still-open trade falls back to the intent's scheduled boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeExitReason {
    StopLoss,
    TakeProfit,
    SessionEnd,
    /// No exit fill exists yet; this is the intent's `valid_to_reason`.
    Scheduled { valid_to_reason: ValidToReason },
}

impl TradeExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeExitReason::StopLoss => "stop_loss",
            TradeExitReason::TakeProfit => "take_profit",
            TradeExitReason::SessionEnd => "session_end",
            TradeExitReason::Scheduled { valid_to_reason } => match valid_to_reason {
                ValidToReason::OneBar => "scheduled_one_bar",
                ValidToReason::FixedMinutes => "scheduled_fixed_minutes",
                ValidToReason::SessionEnd => "scheduled_session_end",
            },
        }
    }
}

/// A paired trade record. `exit_*` fields are `None` for an entry-only
/// (still-open) template.
///
/// Accounting identity on every row, open or closed:
/// `net_pnl == gross_pnl - total_cost` and
/// `total_cost == commission_cost + slippage_cost`, where the cost fields are
/// the exact sums of the per-fill cost fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub template_id: TemplateId,
    pub symbol: String,
    pub side: Side,
    pub qty: f64,

    pub entry_ts: DateTime<Utc>,
    pub entry_price: f64,
    pub entry_effective_price: f64,

    pub exit_ts: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub exit_effective_price: Option<f64>,

    pub gross_pnl: f64,
    pub commission_cost: f64,
    pub slippage_cost: f64,
    pub total_cost: f64,
    pub net_pnl: f64,

    pub exit_reason: TradeExitReason,
}

impl Trade {
    pub fn is_closed(&self) -> bool {
        self.exit_ts.is_some()
    }
}
