//! Slippage and commission model.
//!
//! Both costs are proportional, in basis points of price. A buy execution
//! slips the price up, a sell slips it down, by the same proportional amount;
//! commission is charged on the effective (executed) notional of both legs.

use crate::domain::Side;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub commission_bps: f64,
    pub slippage_bps: f64,
}

impl CostModel {
    pub fn free() -> Self {
        Self {
            commission_bps: 0.0,
            slippage_bps: 0.0,
        }
    }

    /// Executed price after slippage: `ideal * (1 ± slippage_bps / 10_000)`.
    pub fn effective_price(&self, exec_side: Side, ideal: f64) -> f64 {
        let slip = self.slippage_bps / 10_000.0;
        match exec_side {
            Side::Buy => ideal * (1.0 + slip),
            Side::Sell => ideal * (1.0 - slip),
        }
    }

    /// Slippage cost in currency for one fill.
    pub fn slippage_cost(&self, exec_side: Side, ideal: f64, qty: f64) -> f64 {
        (self.effective_price(exec_side, ideal) - ideal).abs() * qty
    }

    /// Commission in currency, charged on the effective notional.
    pub fn commission(&self, effective_price: f64, qty: f64) -> f64 {
        effective_price * qty * self.commission_bps / 10_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_slips_up_sell_slips_down() {
        let model = CostModel {
            commission_bps: 0.0,
            slippage_bps: 10.0,
        };
        assert_eq!(model.effective_price(Side::Buy, 100.0), 100.1);
        assert_eq!(model.effective_price(Side::Sell, 100.0), 99.9);
    }

    #[test]
    fn slippage_cost_is_symmetric() {
        let model = CostModel {
            commission_bps: 0.0,
            slippage_bps: 10.0,
        };
        let buy = model.slippage_cost(Side::Buy, 100.0, 50.0);
        let sell = model.slippage_cost(Side::Sell, 100.0, 50.0);
        assert!((buy - sell).abs() < 1e-9);
        assert!((buy - 5.0).abs() < 1e-9); // 0.1 per share * 50
    }

    #[test]
    fn commission_on_effective_notional() {
        let model = CostModel {
            commission_bps: 2.0,
            slippage_bps: 0.0,
        };
        let c = model.commission(100.0, 50.0);
        assert!((c - 1.0).abs() < 1e-12); // 5_000 notional * 2bps
    }

    #[test]
    fn free_model_is_identity() {
        let model = CostModel::free();
        assert_eq!(model.effective_price(Side::Buy, 64.62), 64.62);
        assert_eq!(model.commission(64.62, 100.0), 0.0);
    }
}
