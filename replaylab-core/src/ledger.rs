//! Cash-only portfolio ledger with deterministic replay.
//!
//! The ledger exclusively owns its entries: they are appended, never mutated,
//! never deleted. `seq` disambiguates entries sharing a timestamp. In this
//! core mode equity equals cash — open positions are not marked to market.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Trade;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEventType {
    Start,
    TradeExit,
}

/// One permanent ledger row. `fees` and `slippage` are evidence fields only:
/// they are already reflected inside `pnl`, and are never subtracted again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub seq: u64,
    pub ts: DateTime<Utc>,
    pub event_type: LedgerEventType,
    pub pnl: f64,
    pub fees: f64,
    pub slippage: f64,
    pub cash_before: f64,
    pub cash_after: f64,
    pub equity_before: f64,
    pub equity_after: f64,
    pub meta: BTreeMap<String, String>,
}

/// Timestamp safety mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampMode {
    /// Non-monotonic or naive timestamps are hard errors.
    Strict,
    /// Multi-symbol exits may arrive out of chronological order; `seq`, not
    /// the timestamp, provides the tie-break. Naive timestamps are normalized
    /// to UTC with an evidence flag.
    Permissive,
}

/// Timestamp input to `apply_trade`: aware, or naive from a source that
/// dropped the zone.
#[derive(Debug, Clone, Copy)]
pub enum LedgerTimestamp {
    Aware(DateTime<Utc>),
    Naive(NaiveDateTime),
}

impl From<DateTime<Utc>> for LedgerTimestamp {
    fn from(ts: DateTime<Utc>) -> Self {
        LedgerTimestamp::Aware(ts)
    }
}

impl From<NaiveDateTime> for LedgerTimestamp {
    fn from(ts: NaiveDateTime) -> Self {
        LedgerTimestamp::Naive(ts)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LedgerError {
    #[error("exit timestamp {next} regresses behind {prev} (seq {seq}) in strict mode")]
    NonMonotonicTimestamp {
        seq: u64,
        prev: DateTime<Utc>,
        next: DateTime<Utc>,
    },

    #[error("naive exit timestamp rejected in strict mode")]
    NaiveTimestamp,
}

/// Ledger summary exposed to reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub initial_cash_usd: f64,
    pub final_cash_usd: f64,
    pub total_pnl_net_usd: f64,
    pub total_fees_usd: f64,
    pub total_slippage_usd: f64,
}

#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    mode: TimestampMode,
    initial_cash: f64,
    cash: f64,
    entries: Vec<LedgerEntry>,
}

impl PortfolioLedger {
    /// Seed the ledger with a START entry: `cash = equity = initial_cash`.
    pub fn new(initial_cash: f64, start_ts: DateTime<Utc>, mode: TimestampMode) -> Self {
        let start = LedgerEntry {
            seq: 0,
            ts: start_ts,
            event_type: LedgerEventType::Start,
            pnl: 0.0,
            fees: 0.0,
            slippage: 0.0,
            cash_before: initial_cash,
            cash_after: initial_cash,
            equity_before: initial_cash,
            equity_after: initial_cash,
            meta: BTreeMap::new(),
        };
        Self {
            mode,
            initial_cash,
            cash: initial_cash,
            entries: vec![start],
        }
    }

    /// Append one TRADE_EXIT entry. `pnl_net` already includes fees and
    /// slippage; they are recorded as evidence, not re-applied:
    /// `cash_after = cash_before + pnl_net`.
    pub fn apply_trade(
        &mut self,
        exit_ts: impl Into<LedgerTimestamp>,
        pnl_net: f64,
        fees: f64,
        slippage: f64,
        mut meta: BTreeMap<String, String>,
    ) -> Result<&LedgerEntry, LedgerError> {
        let ts = match exit_ts.into() {
            LedgerTimestamp::Aware(ts) => ts,
            LedgerTimestamp::Naive(naive) => {
                if self.mode == TimestampMode::Strict {
                    return Err(LedgerError::NaiveTimestamp);
                }
                tracing::warn!(%naive, "naive exit timestamp normalized to UTC");
                meta.insert("naive_ts_normalized".into(), "true".into());
                Utc.from_utc_datetime(&naive)
            }
        };

        let seq = self.entries.len() as u64;
        let prev_ts = self.entries[self.entries.len() - 1].ts;
        if ts < prev_ts {
            match self.mode {
                TimestampMode::Strict => {
                    return Err(LedgerError::NonMonotonicTimestamp {
                        seq,
                        prev: prev_ts,
                        next: ts,
                    });
                }
                TimestampMode::Permissive => {
                    tracing::debug!(seq, %prev_ts, %ts, "out-of-order exit; seq is the tie-break");
                }
            }
        }

        let cash_before = self.cash;
        let cash_after = cash_before + pnl_net;
        self.cash = cash_after;
        self.entries.push(LedgerEntry {
            seq,
            ts,
            event_type: LedgerEventType::TradeExit,
            pnl: pnl_net,
            fees,
            slippage,
            cash_before,
            cash_after,
            equity_before: cash_before,
            equity_after: cash_after,
            meta,
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn summary(&self) -> LedgerSummary {
        let mut pnl = 0.0;
        let mut fees = 0.0;
        let mut slippage = 0.0;
        for e in &self.entries {
            pnl += e.pnl;
            fees += e.fees;
            slippage += e.slippage;
        }
        LedgerSummary {
            initial_cash_usd: self.initial_cash,
            final_cash_usd: self.cash,
            total_pnl_net_usd: pnl,
            total_fees_usd: fees,
            total_slippage_usd: slippage,
        }
    }

    /// Reconstruct a ledger from a trade table, in canonical
    /// `(exit_ts, template_id)` order. Shuffle-invariant: any permutation of
    /// the same trades reproduces the same entries row for row.
    pub fn replay_from_trades(
        trades: &[Trade],
        initial_cash: f64,
        start_ts: DateTime<Utc>,
        mode: TimestampMode,
    ) -> Result<Self, LedgerError> {
        let mut closed: Vec<&Trade> = trades.iter().filter(|t| t.is_closed()).collect();
        closed.sort_by(|a, b| (a.exit_ts, &a.template_id).cmp(&(b.exit_ts, &b.template_id)));

        let mut ledger = Self::new(initial_cash, start_ts, mode);
        for trade in closed {
            let mut meta = BTreeMap::new();
            meta.insert("template_id".into(), trade.template_id.to_string());
            meta.insert("symbol".into(), trade.symbol.clone());
            meta.insert("exit_reason".into(), trade.exit_reason.as_str().into());
            // is_closed() filtered above
            let exit_ts = trade.exit_ts.unwrap_or(start_ts);
            ledger.apply_trade(
                exit_ts,
                trade.net_pnl,
                trade.commission_cost,
                trade.slippage_cost,
                meta,
            )?;
        }
        Ok(ledger)
    }
}
