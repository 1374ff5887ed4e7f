//! Trade pairing: fold each template's fills into one trade record and apply
//! the cost model.
//!
//! The cost fields stamped on the fills and the totals carried on the trade
//! come from the same computation, so the per-fill breakdown sums to the
//! trade-level totals exactly — an accounting identity, not an approximation.

use std::collections::BTreeMap;

use crate::costs::CostModel;
use crate::domain::{Fill, FillReason, Intent, TemplateId, Trade, TradeExitReason};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingOutput {
    /// The input fill log with cost fields stamped on entries and exits.
    pub fills: Vec<Fill>,
    /// One record per template that entered: closed or entry-only.
    pub trades: Vec<Trade>,
}

/// Pair fills into trades. A template with an entry and an exit becomes a
/// closed trade; an entry without an exit becomes an entry-only (still-open)
/// record whose exit reason falls back to the intent's scheduled boundary.
/// Terminal non-fill markers pass through untouched and produce no trade.
pub fn pair_trades(fills: &[Fill], intents: &[Intent], cost: &CostModel) -> PairingOutput {
    let intent_by_id: BTreeMap<&TemplateId, &Intent> =
        intents.iter().map(|i| (&i.template_id, i)).collect();

    let mut by_template: BTreeMap<TemplateId, Vec<usize>> = BTreeMap::new();
    for (i, fill) in fills.iter().enumerate() {
        by_template
            .entry(fill.template_id.clone())
            .or_default()
            .push(i);
    }

    let mut out_fills: Vec<Fill> = fills.to_vec();
    let mut trades: Vec<Trade> = Vec::new();

    for (template_id, indices) in &by_template {
        let Some(intent) = intent_by_id.get(template_id) else {
            tracing::warn!(%template_id, "fills reference an unknown template; skipping");
            continue;
        };
        let entry_idx = indices.iter().copied().find(|&i| fills[i].reason.is_entry());
        let exit_idx = indices.iter().copied().find(|&i| fills[i].reason.is_exit());

        let Some(entry_idx) = entry_idx else {
            continue; // only terminal markers, or nothing: no trade
        };

        let side = intent.side;
        let entry = &fills[entry_idx];
        let qty = entry.qty;

        let entry_effective = cost.effective_price(side, entry.price);
        let entry_commission = cost.commission(entry_effective, qty);
        let entry_slippage = cost.slippage_cost(side, entry.price, qty);
        stamp(&mut out_fills[entry_idx], entry_effective, entry_commission, entry_slippage);

        let mut commission_cost = entry_commission;
        let mut slippage_cost = entry_slippage;

        let (exit_ts, exit_price, exit_effective, exit_reason, gross_pnl) = match exit_idx {
            Some(exit_idx) => {
                let exit = &fills[exit_idx];
                let exit_side = side.opposite();
                let exit_effective = cost.effective_price(exit_side, exit.price);
                let exit_commission = cost.commission(exit_effective, qty);
                let exit_slippage = cost.slippage_cost(exit_side, exit.price, qty);
                stamp(&mut out_fills[exit_idx], exit_effective, exit_commission, exit_slippage);
                commission_cost += exit_commission;
                slippage_cost += exit_slippage;

                let gross = match side {
                    crate::domain::Side::Buy => (exit.price - entry.price) * qty,
                    crate::domain::Side::Sell => (entry.price - exit.price) * qty,
                };
                (
                    Some(exit.ts),
                    Some(exit.price),
                    Some(exit_effective),
                    exit_fill_reason(exit.reason),
                    gross,
                )
            }
            None => (
                None,
                None,
                None,
                TradeExitReason::Scheduled {
                    valid_to_reason: intent.valid_to_reason,
                },
                0.0,
            ),
        };

        let total_cost = commission_cost + slippage_cost;
        trades.push(Trade {
            template_id: template_id.clone(),
            symbol: intent.symbol.clone(),
            side,
            qty,
            entry_ts: entry.ts,
            entry_price: entry.price,
            entry_effective_price: entry_effective,
            exit_ts,
            exit_price,
            exit_effective_price: exit_effective,
            gross_pnl,
            commission_cost,
            slippage_cost,
            total_cost,
            net_pnl: gross_pnl - total_cost,
            exit_reason,
        });
    }

    trades.sort_by(|a, b| (a.entry_ts, &a.template_id).cmp(&(b.entry_ts, &b.template_id)));
    PairingOutput {
        fills: out_fills,
        trades,
    }
}

fn stamp(fill: &mut Fill, effective_price: f64, commission: f64, slippage_cost: f64) {
    fill.effective_price = effective_price;
    fill.commission = commission;
    fill.slippage_cost = slippage_cost;
}

fn exit_fill_reason(reason: FillReason) -> TradeExitReason {
    match reason {
        FillReason::StopLoss => TradeExitReason::StopLoss,
        FillReason::TakeProfit => TradeExitReason::TakeProfit,
        // `pair_trades` only calls this for exit-family reasons.
        _ => TradeExitReason::SessionEnd,
    }
}
