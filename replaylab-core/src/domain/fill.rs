//! Fill — one append-only record in the simulation's fill log.

use super::ids::TemplateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a fill-log record exists. Three families:
/// entries (`SignalFill`), exits (`StopLoss`, `TakeProfit`, `SessionEnd`),
/// and terminal non-fill markers (the three `Order*` variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillReason {
    SignalFill,
    StopLoss,
    TakeProfit,
    SessionEnd,
    OrderCancelledOco,
    OrderAmbiguousNoFill,
    OrderRejectedNettingOpenPosition,
}

impl FillReason {
    pub fn is_entry(self) -> bool {
        matches!(self, FillReason::SignalFill)
    }

    pub fn is_exit(self) -> bool {
        matches!(
            self,
            FillReason::StopLoss | FillReason::TakeProfit | FillReason::SessionEnd
        )
    }

    /// Terminal marker: the template ended without a position.
    pub fn is_reject(self) -> bool {
        !self.is_entry() && !self.is_exit()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FillReason::SignalFill => "signal_fill",
            FillReason::StopLoss => "stop_loss",
            FillReason::TakeProfit => "take_profit",
            FillReason::SessionEnd => "session_end",
            FillReason::OrderCancelledOco => "order_cancelled_oco",
            FillReason::OrderAmbiguousNoFill => "order_ambiguous_no_fill",
            FillReason::OrderRejectedNettingOpenPosition => {
                "order_rejected_netting_open_position"
            }
        }
    }
}

/// A fill-log record. `price` is the ideal (model) price; `effective_price`,
/// `commission`, and `slippage_cost` are stamped by the cost model during
/// pairing and stay zero for non-fill markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub template_id: TemplateId,
    pub symbol: String,
    pub ts: DateTime<Utc>,
    pub price: f64,
    pub reason: FillReason,
    pub qty: f64,
    pub effective_price: f64,
    pub commission: f64,
    pub slippage_cost: f64,
}

impl Fill {
    /// A raw (uncosted) record straight out of the simulator.
    pub fn raw(
        template_id: TemplateId,
        symbol: impl Into<String>,
        ts: DateTime<Utc>,
        price: f64,
        reason: FillReason,
        qty: f64,
    ) -> Self {
        Self {
            template_id,
            symbol: symbol.into(),
            ts,
            price,
            reason,
            qty,
            effective_price: price,
            commission: 0.0,
            slippage_cost: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_families_partition() {
        let all = [
            FillReason::SignalFill,
            FillReason::StopLoss,
            FillReason::TakeProfit,
            FillReason::SessionEnd,
            FillReason::OrderCancelledOco,
            FillReason::OrderAmbiguousNoFill,
            FillReason::OrderRejectedNettingOpenPosition,
        ];
        for r in all {
            let memberships =
                r.is_entry() as u8 + r.is_exit() as u8 + r.is_reject() as u8;
            assert_eq!(memberships, 1, "{:?} must be in exactly one family", r);
        }
    }

    #[test]
    fn reason_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&FillReason::OrderCancelledOco).unwrap(),
            "\"order_cancelled_oco\""
        );
        assert_eq!(
            FillReason::OrderRejectedNettingOpenPosition.as_str(),
            "order_rejected_netting_open_position"
        );
    }
}
