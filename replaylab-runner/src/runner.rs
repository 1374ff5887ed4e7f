//! Backtest orchestration: raw signals → sanitized intents → simulation →
//! pairing → ledger → equity → manifest.
//!
//! Per-record failures are collected, never fatal; the batch fails only when
//! zero signal records survive. Independent runs share nothing and may be
//! executed in parallel via [`run_batch`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use replaylab_core::compound::{EventEngine, EventEngineConfig, EventEngineResult};
use replaylab_core::domain::{
    signal_from_fields, Bar, BarError, EventKind, Fill, Intent, RejectedIntent, Symbol,
    TemplateId, Trade,
};
use replaylab_core::ledger::{LedgerEntry, LedgerError, LedgerSummary, PortfolioLedger};
use replaylab_core::manifest::{content_hash, RunManifest, SCHEMA_VERSION};
use replaylab_core::ordering::OrderingViolation;
use replaylab_core::pairing::pair_trades;
use replaylab_core::sanitize::{sanitize, SanitizeError};
use replaylab_core::session::{compute_window, WindowError};
use replaylab_core::sim::{simulate, GapStats, SimConfig};

use crate::config::{ConfigError, ExecutionMode, RunConfig};
use crate::equity::{equity_from_ledger, equity_from_samples, EquityPoint};
use crate::export;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("bar series error: {0}")]
    Bars(#[from] BarError),

    #[error("no bars provided")]
    NoBars,

    #[error("all {attempted} signal records were rejected")]
    NoValidSignals { attempted: usize },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("event ordering violation: {0}")]
    Ordering(#[from] OrderingViolation),

    #[error("artifact serialization failed: {0}")]
    Artifact(String),
}

/// Why one raw signal record never became an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalRejectReason {
    MissingTimestamp,
    LookaheadField { field: String },
    UnparseableTimestamp { field: String },
    Adapter { message: String },
    SessionBoundary,
    InvalidWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedSignal {
    /// Index of the record in the input batch.
    pub index: usize,
    pub reason: SignalRejectReason,
}

/// Complete result of one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub schema_version: u32,
    pub run_id: String,
    pub intents: Vec<Intent>,
    pub fills: Vec<Fill>,
    pub trades: Vec<Trade>,
    pub rejected_signals: Vec<RejectedSignal>,
    pub rejected_intents: Vec<RejectedIntent>,
    pub left_open: Vec<TemplateId>,
    pub gap_stats: GapStats,
    pub ledger_entries: Vec<LedgerEntry>,
    pub summary: LedgerSummary,
    pub equity_curve: Vec<EquityPoint>,
    pub manifest: RunManifest,
    /// Present only for compounding runs.
    pub event_result: Option<EventEngineResult>,
}

/// Run one backtest over pre-loaded bars and raw signal records.
pub fn run_backtest(
    config: &RunConfig,
    bars: &BTreeMap<Symbol, Vec<Bar>>,
    raw_signals: &[BTreeMap<String, Value>],
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    for series in bars.values() {
        replaylab_core::domain::validate_series(series)?;
    }
    let start_ts = bars
        .values()
        .filter_map(|s| s.first())
        .map(|b| b.ts)
        .min()
        .ok_or(RunError::NoBars)?;

    let (intents, rejected_signals) = admit_signals(config, raw_signals);
    if intents.is_empty() && !raw_signals.is_empty() {
        return Err(RunError::NoValidSignals {
            attempted: raw_signals.len(),
        });
    }

    let sim_cfg = SimConfig {
        qty: match config.execution {
            ExecutionMode::FixedQty { qty } => qty,
            // Trigger logic is quantity-independent; the event engine sizes
            // entries from cash afterwards.
            ExecutionMode::Compounding { .. } => 1.0,
        },
        exhausted_data: config.exhausted_data,
    };
    let sim = simulate(intents.clone(), bars, &sim_cfg)?;

    let (fills, trades, ledger, equity_curve, event_result) = match config.execution {
        ExecutionMode::FixedQty { .. } => {
            let out = pair_trades(&sim.fills, &intents, &config.cost);
            let ledger = PortfolioLedger::replay_from_trades(
                &out.trades,
                config.initial_cash,
                start_ts,
                config.ledger_mode,
            )?;
            let equity = equity_from_ledger(ledger.entries());
            (out.fills, out.trades, ledger, equity, None)
        }
        ExecutionMode::Compounding {
            fixed_qty,
            rounding,
        } => {
            let events = events_from_fills(&sim.fills, &intents);
            let engine_cfg = EventEngineConfig {
                initial_cash: config.initial_cash,
                fixed_qty,
                rounding,
                commission_bps: config.cost.commission_bps,
                slippage_bps: config.cost.slippage_bps,
            };
            let ev = EventEngine::new(engine_cfg).run(events)?;
            let trades = trades_from_events(&ev, &sim.fills, &intents);
            let ledger = PortfolioLedger::replay_from_trades(
                &trades,
                config.initial_cash,
                start_ts,
                config.ledger_mode,
            )?;
            let mut samples = vec![(start_ts, config.initial_cash)];
            samples.extend(ev.executed.iter().map(|e| (e.event.ts, e.cash_after)));
            let equity = equity_from_samples(&samples);
            (sim.fills.clone(), trades, ledger, equity, Some(ev))
        }
    };

    let summary = ledger.summary();
    let ledger_entries = ledger.entries().to_vec();
    let manifest = build_manifest(config, bars, &intents, &fills, &trades, &equity_curve)?;

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: manifest.run_id.clone(),
        intents,
        fills,
        trades,
        rejected_signals,
        rejected_intents: sim.rejected,
        left_open: sim.left_open,
        gap_stats: sim.gap_stats,
        ledger_entries,
        summary,
        equity_curve,
        manifest,
        event_result,
    })
}

/// Run independent configs in parallel. No state is shared between runs, so
/// no coordination is needed.
pub fn run_batch(
    configs: &[RunConfig],
    bars: &BTreeMap<Symbol, Vec<Bar>>,
    raw_signals: &[BTreeMap<String, Value>],
) -> Vec<Result<BacktestResult, RunError>> {
    configs
        .par_iter()
        .map(|cfg| run_backtest(cfg, bars, raw_signals))
        .collect()
}

// ─── Signal admission ───────────────────────────────────────────────

fn admit_signals(
    config: &RunConfig,
    raw_signals: &[BTreeMap<String, Value>],
) -> (Vec<Intent>, Vec<RejectedSignal>) {
    let mut intents = Vec::new();
    let mut rejected = Vec::new();

    for (index, raw) in raw_signals.iter().enumerate() {
        match admit_one(config, raw) {
            Ok(intent) => intents.push(intent),
            Err(reason) => {
                tracing::warn!(index, ?reason, "signal record rejected");
                rejected.push(RejectedSignal { index, reason });
            }
        }
    }
    (intents, rejected)
}

fn admit_one(
    config: &RunConfig,
    raw: &BTreeMap<String, Value>,
) -> Result<Intent, SignalRejectReason> {
    let generated_ts = peek_signal_ts(raw).ok_or(SignalRejectReason::MissingTimestamp)?;

    let clean = sanitize(raw, generated_ts, config.strict_sanitizer).map_err(|e| match e {
        SanitizeError::LookaheadField { field, .. } => SignalRejectReason::LookaheadField { field },
        SanitizeError::UnparseableTimestamp { field, .. } => {
            SignalRejectReason::UnparseableTimestamp { field }
        }
    })?;

    let record = signal_from_fields(&clean).map_err(|e| SignalRejectReason::Adapter {
        message: e.to_string(),
    })?;

    let (valid_from, valid_to) = compute_window(
        record.signal_ts,
        config.timeframe_minutes,
        &config.calendar,
        config.validity_policy,
        config.valid_from_policy,
    )
    .map_err(|e| match e {
        WindowError::SessionBoundary { .. } => SignalRejectReason::SessionBoundary,
        WindowError::InvalidWindow { .. } | WindowError::NonPositiveTimeframe { .. } => {
            SignalRejectReason::InvalidWindow
        }
    })?;

    Ok(Intent {
        template_id: record.template_id,
        signal_ts: record.signal_ts,
        symbol: record.symbol,
        side: record.side,
        entry_price: record.entry_price,
        stop_price: record.stop_price,
        take_profit_price: record.take_profit_price,
        oco_group_id: record.oco_group_id,
        valid_from,
        valid_to,
        valid_to_reason: config.validity_policy.valid_to_reason(),
    })
}

/// The intent-generation instant, read before sanitization so the sanitizer
/// has a reference point to compare other timestamps against.
fn peek_signal_ts(raw: &BTreeMap<String, Value>) -> Option<DateTime<Utc>> {
    ["signal_ts", "timestamp", "ts"]
        .iter()
        .find_map(|k| raw.get(*k))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

// ─── Compounding helpers ────────────────────────────────────────────

/// Project the fill log into trade events. Entries keep the intent's side;
/// exits carry the closing side. Non-fill markers project to nothing.
fn events_from_fills(
    fills: &[Fill],
    intents: &[Intent],
) -> Vec<replaylab_core::domain::TradeEvent> {
    let side_by_id: BTreeMap<&TemplateId, replaylab_core::domain::Side> =
        intents.iter().map(|i| (&i.template_id, i.side)).collect();

    fills
        .iter()
        .filter_map(|f| {
            let side = *side_by_id.get(&f.template_id)?;
            let kind = if f.reason.is_entry() {
                EventKind::Entry
            } else if f.reason.is_exit() {
                EventKind::Exit
            } else {
                return None;
            };
            Some(replaylab_core::domain::TradeEvent {
                ts: f.ts,
                kind,
                symbol: f.symbol.clone(),
                template_id: f.template_id.clone(),
                side: if kind == EventKind::Entry {
                    side
                } else {
                    side.opposite()
                },
                price: f.price,
            })
        })
        .collect()
}

/// Rebuild trade records from the event engine's executions, inheriting each
/// exit reason from the corresponding fill.
fn trades_from_events(
    result: &EventEngineResult,
    fills: &[Fill],
    intents: &[Intent],
) -> Vec<Trade> {
    use replaylab_core::domain::{FillReason, Side, TradeExitReason};

    let intent_by_id: BTreeMap<&TemplateId, &Intent> =
        intents.iter().map(|i| (&i.template_id, i)).collect();
    let exit_reason_by_id: BTreeMap<&TemplateId, FillReason> = fills
        .iter()
        .filter(|f| f.reason.is_exit())
        .map(|f| (&f.template_id, f.reason))
        .collect();

    let mut entries: BTreeMap<TemplateId, &replaylab_core::compound::ExecutedEvent> =
        BTreeMap::new();
    let mut exits: BTreeMap<TemplateId, &replaylab_core::compound::ExecutedEvent> =
        BTreeMap::new();
    for e in &result.executed {
        match e.event.kind {
            EventKind::Entry => {
                entries.insert(e.event.template_id.clone(), e);
            }
            EventKind::Exit => {
                exits.insert(e.event.template_id.clone(), e);
            }
        }
    }

    let mut trades = Vec::new();
    for (template_id, entry) in &entries {
        let Some(intent) = intent_by_id.get(template_id) else {
            continue;
        };
        let side = intent.side;
        let qty = entry.qty;
        let exit = exits.get(template_id);

        let mut commission_cost = entry.commission;
        let mut slippage_cost = entry.slippage_cost;
        let (exit_ts, exit_price, exit_effective, exit_reason, gross_pnl) = match exit {
            Some(x) => {
                commission_cost += x.commission;
                slippage_cost += x.slippage_cost;
                let gross = match side {
                    Side::Buy => (x.event.price - entry.event.price) * qty,
                    Side::Sell => (entry.event.price - x.event.price) * qty,
                };
                let reason = match exit_reason_by_id.get(template_id) {
                    Some(FillReason::StopLoss) => TradeExitReason::StopLoss,
                    Some(FillReason::TakeProfit) => TradeExitReason::TakeProfit,
                    _ => TradeExitReason::SessionEnd,
                };
                (
                    Some(x.event.ts),
                    Some(x.event.price),
                    Some(x.effective_price),
                    reason,
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
            entry_ts: entry.event.ts,
            entry_price: entry.event.price,
            entry_effective_price: entry.effective_price,
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
    trades
}

// ─── Manifest ───────────────────────────────────────────────────────

fn build_manifest(
    config: &RunConfig,
    bars: &BTreeMap<Symbol, Vec<Bar>>,
    intents: &[Intent],
    fills: &[Fill],
    trades: &[Trade],
    equity_curve: &[EquityPoint],
) -> Result<RunManifest, RunError> {
    let artifact = |r: anyhow::Result<String>| r.map_err(|e| RunError::Artifact(e.to_string()));

    let bars_hash = content_hash(artifact(export::bars_csv(bars))?.as_bytes());
    let intent_hash = content_hash(artifact(export::intents_csv(intents))?.as_bytes());
    let fills_hash = content_hash(artifact(export::fills_csv(fills))?.as_bytes());
    let trades_hash = content_hash(artifact(export::trades_csv(trades))?.as_bytes());
    let equity_hash = content_hash(artifact(export::equity_csv(equity_curve))?.as_bytes());
    let run_id = content_hash(format!("{}:{}", config.config_hash(), bars_hash).as_bytes());

    Ok(RunManifest {
        schema_version: SCHEMA_VERSION,
        run_id,
        bars_hash,
        intent_hash,
        fills_hash,
        trades_hash,
        equity_hash,
    })
}
