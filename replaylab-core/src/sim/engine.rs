//! The bar-by-bar trigger/fill/cancel loop.
//!
//! Bars are processed in ascending timestamp order across all symbols. Within
//! one timestamp, exits are evaluated before entries (a netting slot freed
//! by a close is usable by an entry at the same instant),
//! and open-gap fills are sequenced before intrabar crosses — the open of a
//! bar happens before anything else inside it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::domain::{
    validate_series, Bar, BarError, Fill, FillReason, Intent, RejectedIntent, Side, Symbol,
    TemplateId,
};

use super::state::TemplateState;
use super::{ExhaustedDataPolicy, GapStats, SimConfig, SimResult};

/// Fill simulator. Owns nothing between runs; each call to [`run`] is an
/// independent, deterministic replay.
///
/// [`run`]: FillSimulator::run
pub struct FillSimulator {
    cfg: SimConfig,
}

/// Convenience wrapper around [`FillSimulator::run`].
pub fn simulate(
    intents: Vec<Intent>,
    bars: &BTreeMap<Symbol, Vec<Bar>>,
    cfg: &SimConfig,
) -> Result<SimResult, BarError> {
    FillSimulator::new(*cfg).run(intents, bars)
}

struct Tpl {
    intent: Intent,
    state: TemplateState,
}

/// An entry that would trigger on the current bar.
struct Candidate {
    idx: usize,
    symbol: Symbol,
    template_id: TemplateId,
    /// The open had already crossed the trigger level; the fill happens at
    /// the open, before any intrabar cross.
    gapped: bool,
    price: f64,
}

impl FillSimulator {
    pub fn new(cfg: SimConfig) -> Self {
        Self { cfg }
    }

    pub fn run(
        &self,
        intents: Vec<Intent>,
        bars: &BTreeMap<Symbol, Vec<Bar>>,
    ) -> Result<SimResult, BarError> {
        for series in bars.values() {
            validate_series(series)?;
        }

        // Admission: malformed intents are rejected per template, the batch
        // continues.
        let mut rejected = Vec::new();
        let mut tpls: Vec<Tpl> = Vec::new();
        for intent in intents {
            match intent.validate() {
                Ok(()) => tpls.push(Tpl {
                    intent,
                    state: TemplateState::Pending,
                }),
                Err(reason) => {
                    tracing::warn!(
                        template_id = %intent.template_id,
                        reason = reason.as_str(),
                        "intent rejected at admission"
                    );
                    rejected.push(RejectedIntent {
                        template_id: intent.template_id,
                        reason,
                    });
                }
            }
        }
        // Canonical template order: the rest of the loop only ever iterates
        // index ranges, so the output is invariant to input order.
        tpls.sort_by(|a, b| a.intent.template_id.cmp(&b.intent.template_id));

        let mut by_symbol: BTreeMap<Symbol, Vec<usize>> = BTreeMap::new();
        let mut oco_groups: BTreeMap<crate::domain::OcoGroupId, Vec<usize>> = BTreeMap::new();
        for (i, t) in tpls.iter().enumerate() {
            by_symbol.entry(t.intent.symbol.clone()).or_default().push(i);
            if let Some(g) = &t.intent.oco_group_id {
                oco_groups.entry(g.clone()).or_default().push(i);
            }
        }

        // Global bar schedule: ts → [(symbol, bar index)], symbols in order.
        let mut schedule: BTreeMap<DateTime<Utc>, Vec<(&str, usize)>> = BTreeMap::new();
        for (sym, series) in bars {
            for (i, bar) in series.iter().enumerate() {
                schedule.entry(bar.ts).or_default().push((sym.as_str(), i));
            }
        }
        let median_gaps: BTreeMap<&str, i64> = bars
            .iter()
            .map(|(sym, series)| (sym.as_str(), median_gap_seconds(series)))
            .collect();

        let mut open_pos: BTreeMap<Symbol, usize> = BTreeMap::new();
        let mut fills: Vec<Fill> = Vec::new();
        let mut gap_stats = GapStats::default();

        for (&ts, at_ts) in &schedule {
            // Phase 1: exits (incl. window-boundary closes) before entries.
            for &(sym, bar_idx) in at_ts {
                let Some(&tpl_idx) = open_pos.get(sym) else {
                    continue;
                };
                let bar = &bars[sym][bar_idx];
                let (valid_to, entry_ts) = {
                    let t = &tpls[tpl_idx];
                    let entry_ts = match t.state {
                        TemplateState::EntryFilled { entry_ts } => entry_ts,
                        _ => continue,
                    };
                    (t.intent.valid_to, entry_ts)
                };

                if valid_to <= ts {
                    self.close_at_valid_to(
                        &mut tpls[tpl_idx],
                        &bars[sym],
                        &mut fills,
                        &mut gap_stats,
                        median_gaps[sym],
                    );
                    open_pos.remove(sym);
                } else if ts > entry_ts {
                    if let Some((reason, price)) = exit_touch(&tpls[tpl_idx].intent, bar) {
                        fills.push(Fill::raw(
                            tpls[tpl_idx].intent.template_id.clone(),
                            sym,
                            ts,
                            price,
                            reason,
                            self.cfg.qty,
                        ));
                        tpls[tpl_idx].state = TemplateState::ExitFilled;
                        open_pos.remove(sym);
                    }
                }
            }

            // Phase 2a: collect entry candidates across all symbols at ts.
            let mut candidates: Vec<Candidate> = Vec::new();
            for &(sym, bar_idx) in at_ts {
                let bar = &bars[sym][bar_idx];
                let Some(indices) = by_symbol.get(sym) else {
                    continue;
                };
                for &i in indices {
                    let t = &mut tpls[i];
                    if !t.state.is_pending() {
                        continue;
                    }
                    if ts >= t.intent.valid_to {
                        t.state = TemplateState::Expired;
                        continue;
                    }
                    if ts < t.intent.valid_from {
                        continue;
                    }
                    if let Some((gapped, price)) = entry_trigger(&t.intent, bar) {
                        candidates.push(Candidate {
                            idx: i,
                            symbol: sym.to_string(),
                            template_id: t.intent.template_id.clone(),
                            gapped,
                            price,
                        });
                    }
                }
            }

            // Phase 2b: same-bar OCO ambiguity. When two siblings trigger in
            // one bar, precedence is known only if exactly one of them was
            // gap-filled at the open; otherwise neither fills.
            let mut ambiguous: Vec<usize> = Vec::new();
            for members in oco_groups.values() {
                let triggered: Vec<&Candidate> = candidates
                    .iter()
                    .filter(|c| members.contains(&c.idx))
                    .collect();
                if triggered.len() >= 2 {
                    let gapped = triggered.iter().filter(|c| c.gapped).count();
                    if gapped != 1 {
                        ambiguous.extend(triggered.iter().map(|c| c.idx));
                    }
                }
            }
            for idx in ambiguous {
                let t = &mut tpls[idx];
                if !t.state.is_pending() {
                    continue;
                }
                fills.push(Fill::raw(
                    t.intent.template_id.clone(),
                    t.intent.symbol.clone(),
                    ts,
                    t.intent.entry_price,
                    FillReason::OrderAmbiguousNoFill,
                    0.0,
                ));
                t.state = TemplateState::Cancelled;
            }

            // Phase 2c: process survivors in temporal order — every open-gap
            // fill precedes every intrabar cross; remaining ties resolve by
            // (symbol, template_id).
            candidates.sort_by(|a, b| {
                (!a.gapped, &a.symbol, &a.template_id)
                    .cmp(&(!b.gapped, &b.symbol, &b.template_id))
            });
            for cand in &candidates {
                if !tpls[cand.idx].state.is_pending() {
                    continue; // cancelled by an OCO sibling earlier in this bar
                }
                if open_pos.contains_key(&cand.symbol) {
                    let t = &mut tpls[cand.idx];
                    fills.push(Fill::raw(
                        t.intent.template_id.clone(),
                        t.intent.symbol.clone(),
                        ts,
                        t.intent.entry_price,
                        FillReason::OrderRejectedNettingOpenPosition,
                        0.0,
                    ));
                    t.state = TemplateState::Cancelled;
                    continue;
                }

                fills.push(Fill::raw(
                    cand.template_id.clone(),
                    cand.symbol.clone(),
                    ts,
                    cand.price,
                    FillReason::SignalFill,
                    self.cfg.qty,
                ));
                tpls[cand.idx].state = TemplateState::EntryFilled { entry_ts: ts };
                open_pos.insert(cand.symbol.clone(), cand.idx);

                // First fill cancels every sibling still pending.
                let group = tpls[cand.idx].intent.oco_group_id.clone();
                if let Some(group) = group {
                    let siblings = oco_groups[&group].clone();
                    for sib in siblings {
                        if sib == cand.idx || !tpls[sib].state.is_pending() {
                            continue;
                        }
                        let s = &mut tpls[sib];
                        fills.push(Fill::raw(
                            s.intent.template_id.clone(),
                            s.intent.symbol.clone(),
                            ts,
                            s.intent.entry_price,
                            FillReason::OrderCancelledOco,
                            0.0,
                        ));
                        s.state = TemplateState::Cancelled;
                    }
                }
            }
        }

        // End of data: close or surface whatever is still open, expire the rest.
        let mut left_open = Vec::new();
        for i in 0..tpls.len() {
            match tpls[i].state {
                TemplateState::EntryFilled { .. } => {
                    let sym = tpls[i].intent.symbol.clone();
                    match self.cfg.exhausted_data {
                        ExhaustedDataPolicy::SnapToLastBar => {
                            self.close_at_valid_to(
                                &mut tpls[i],
                                &bars[&sym],
                                &mut fills,
                                &mut gap_stats,
                                median_gaps[sym.as_str()],
                            );
                        }
                        ExhaustedDataPolicy::LeaveOpen => {
                            tracing::warn!(
                                template_id = %tpls[i].intent.template_id,
                                symbol = %sym,
                                "bar data exhausted before valid_to; template left open"
                            );
                            left_open.push(tpls[i].intent.template_id.clone());
                        }
                    }
                }
                TemplateState::Pending => tpls[i].state = TemplateState::Expired,
                _ => {}
            }
        }

        // Strict time order; at a shared timestamp exits precede entries,
        // non-fill markers come last.
        fills.sort_by(|a, b| {
            (a.ts, reason_class(a.reason), &a.template_id)
                .cmp(&(b.ts, reason_class(b.reason), &b.template_id))
        });

        Ok(SimResult {
            fills,
            rejected,
            left_open,
            gap_stats,
        })
    }

    /// No-trigger fallback: close at `valid_to` using the last bar at or
    /// before it, never synthesizing one. A timestamp mismatch is recorded as
    /// a gap statistic, not an error.
    fn close_at_valid_to(
        &self,
        tpl: &mut Tpl,
        series: &[Bar],
        fills: &mut Vec<Fill>,
        gap_stats: &mut GapStats,
        median_gap_seconds: i64,
    ) {
        let valid_to = tpl.intent.valid_to;
        let n = series.partition_point(|b| b.ts <= valid_to);
        debug_assert!(n > 0, "an entered template always has a bar before valid_to");
        let bar = &series[n - 1];

        // A bar stamped exactly at valid_to opens at valid_to, so its open is
        // the price at the boundary; an earlier bar's close is the latest
        // price known before it.
        let price = if bar.ts == valid_to { bar.open } else { bar.close };
        if bar.ts != valid_to {
            let gap = (valid_to - bar.ts).num_seconds();
            gap_stats.record_snap(gap, median_gap_seconds);
        }
        fills.push(Fill::raw(
            tpl.intent.template_id.clone(),
            tpl.intent.symbol.clone(),
            bar.ts,
            price,
            FillReason::SessionEnd,
            self.cfg.qty,
        ));
        tpl.state = TemplateState::ExitFilled;
    }
}

fn reason_class(reason: FillReason) -> u8 {
    if reason.is_exit() {
        0
    } else if reason.is_entry() {
        1
    } else {
        2
    }
}

/// Entry trigger check. Returns `(gapped, fill_price)` when the bar touches
/// the entry level: the trigger level itself on an intrabar cross, the bar's
/// open when the open had already crossed it.
fn entry_trigger(intent: &Intent, bar: &Bar) -> Option<(bool, f64)> {
    let entry = intent.entry_price;
    match intent.side {
        Side::Buy => {
            if bar.open >= entry {
                Some((true, bar.open))
            } else if bar.high >= entry {
                Some((false, entry))
            } else {
                None
            }
        }
        Side::Sell => {
            if bar.open <= entry {
                Some((true, bar.open))
            } else if bar.low <= entry {
                Some((false, entry))
            } else {
                None
            }
        }
    }
}

/// Exit evaluation for an open position. When both the stop and the
/// take-profit are touched inside one bar, the stop wins.
fn exit_touch(intent: &Intent, bar: &Bar) -> Option<(FillReason, f64)> {
    let stop = intent.stop_price;
    let tp = intent.take_profit_price;
    let (stop_gap, stop_touch, tp_gap, tp_touch) = match intent.side {
        // Long position: stop below, target above.
        Side::Buy => (
            bar.open <= stop,
            bar.open <= stop || bar.low <= stop,
            bar.open >= tp,
            bar.open >= tp || bar.high >= tp,
        ),
        // Short position: stop above, target below.
        Side::Sell => (
            bar.open >= stop,
            bar.open >= stop || bar.high >= stop,
            bar.open <= tp,
            bar.open <= tp || bar.low <= tp,
        ),
    };

    if stop_touch {
        let price = if stop_gap { bar.open } else { stop };
        Some((FillReason::StopLoss, price))
    } else if tp_touch {
        let price = if tp_gap { bar.open } else { tp };
        Some((FillReason::TakeProfit, price))
    } else {
        None
    }
}

/// Median inter-bar gap in seconds, 0 for series shorter than two bars.
fn median_gap_seconds(series: &[Bar]) -> i64 {
    if series.len() < 2 {
        return 0;
    }
    let mut gaps: Vec<i64> = series
        .windows(2)
        .map(|w| (w[1].ts - w[0].ts).num_seconds())
        .collect();
    gaps.sort_unstable();
    gaps[gaps.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OcoGroupId, ValidToReason};
    use chrono::TimeZone;

    fn ts(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap() + chrono::Duration::minutes(min)
    }

    fn bar(min: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            symbol: "SPY".into(),
            ts: ts(min),
            open,
            high,
            low,
            close,
            volume: 1_000_000.0,
        }
    }

    fn intent(id: &str, side: Side, entry: f64, stop: f64, tp: f64) -> Intent {
        Intent {
            template_id: TemplateId::from(id),
            signal_ts: ts(0),
            symbol: "SPY".into(),
            side,
            entry_price: entry,
            stop_price: stop,
            take_profit_price: tp,
            oco_group_id: None,
            valid_from: ts(0),
            valid_to: ts(30),
            valid_to_reason: ValidToReason::SessionEnd,
        }
    }

    fn spy(bars: Vec<Bar>) -> BTreeMap<Symbol, Vec<Bar>> {
        let mut m = BTreeMap::new();
        m.insert("SPY".to_string(), bars);
        m
    }

    fn run(intents: Vec<Intent>, bars: BTreeMap<Symbol, Vec<Bar>>) -> SimResult {
        simulate(intents, &bars, &SimConfig::default()).unwrap()
    }

    fn reasons(result: &SimResult) -> Vec<FillReason> {
        result.fills.iter().map(|f| f.reason).collect()
    }

    #[test]
    fn intrabar_cross_fills_at_trigger_level() {
        let bars = spy(vec![bar(0, 64.40, 64.70, 64.30, 64.65)]);
        let i = intent("T1", Side::Buy, 64.62, 63.00, 66.00);
        let result = run(vec![i], bars);
        assert_eq!(result.fills.len(), 2); // entry + session-end close
        assert_eq!(result.fills[0].reason, FillReason::SignalFill);
        assert_eq!(result.fills[0].price, 64.62);
    }

    #[test]
    fn gap_open_fills_at_open_not_trigger() {
        let bars = spy(vec![bar(0, 64.80, 65.00, 64.60, 64.90)]);
        let i = intent("T1", Side::Buy, 64.62, 63.00, 66.00);
        let result = run(vec![i], bars);
        assert_eq!(result.fills[0].reason, FillReason::SignalFill);
        assert_eq!(result.fills[0].price, 64.80);
    }

    #[test]
    fn no_touch_no_fill_template_expires() {
        let bars = spy(vec![bar(0, 63.00, 63.50, 62.80, 63.20)]);
        let i = intent("T1", Side::Buy, 64.62, 62.00, 66.00);
        let result = run(vec![i], bars);
        assert!(result.fills.is_empty());
    }

    #[test]
    fn stop_wins_when_both_levels_touched() {
        let bars = spy(vec![
            bar(0, 100.0, 100.6, 99.8, 100.5),
            // Wide bar touching both the 98 stop and the 104 target.
            bar(5, 100.5, 105.0, 97.0, 99.0),
        ]);
        let i = intent("T1", Side::Buy, 100.5, 98.0, 104.0);
        let result = run(vec![i], bars);
        let exit = result.fills.iter().find(|f| f.reason.is_exit()).unwrap();
        assert_eq!(exit.reason, FillReason::StopLoss);
        assert_eq!(exit.price, 98.0);
    }

    #[test]
    fn take_profit_fills_at_level() {
        let bars = spy(vec![
            bar(0, 100.0, 100.6, 99.8, 100.5),
            bar(5, 100.5, 104.5, 100.0, 104.0),
        ]);
        let i = intent("T1", Side::Buy, 100.5, 98.0, 104.0);
        let result = run(vec![i], bars);
        let exit = result.fills.iter().find(|f| f.reason.is_exit()).unwrap();
        assert_eq!(exit.reason, FillReason::TakeProfit);
        assert_eq!(exit.price, 104.0);
    }

    #[test]
    fn exit_gap_through_stop_fills_at_open() {
        let bars = spy(vec![
            bar(0, 100.0, 100.6, 99.8, 100.5),
            bar(5, 96.0, 97.0, 95.5, 96.5), // opens far below the 98 stop
        ]);
        let i = intent("T1", Side::Buy, 100.5, 98.0, 104.0);
        let result = run(vec![i], bars);
        let exit = result.fills.iter().find(|f| f.reason.is_exit()).unwrap();
        assert_eq!(exit.reason, FillReason::StopLoss);
        assert_eq!(exit.price, 96.0);
    }

    #[test]
    fn no_same_bar_entry_and_exit() {
        // Entry bar also touches the stop; the exit may only happen on a
        // subsequent bar.
        let bars = spy(vec![
            bar(0, 100.0, 101.0, 97.5, 100.5),
            bar(5, 100.5, 101.0, 100.0, 100.8),
        ]);
        let i = intent("T1", Side::Buy, 100.5, 98.0, 104.0);
        let result = run(vec![i], bars);
        let entry_ts = result.fills[0].ts;
        let exit = result.fills.iter().find(|f| f.reason.is_exit()).unwrap();
        assert!(exit.ts > entry_ts);
    }

    #[test]
    fn oco_first_fill_cancels_sibling() {
        let mut buy = intent("T1", Side::Buy, 110.0, 105.0, 120.0);
        let mut sell = intent("T2", Side::Sell, 90.0, 95.0, 80.0);
        buy.oco_group_id = Some(OcoGroupId::from("G1"));
        sell.oco_group_id = Some(OcoGroupId::from("G1"));
        let bars = spy(vec![bar(0, 105.0, 111.0, 99.0, 105.0)]);
        let result = run(vec![buy, sell], bars);

        let signal_fills = result
            .fills
            .iter()
            .filter(|f| f.reason == FillReason::SignalFill)
            .count();
        let cancelled = result
            .fills
            .iter()
            .filter(|f| f.reason == FillReason::OrderCancelledOco)
            .count();
        assert_eq!(signal_fills, 1);
        assert_eq!(cancelled, 1);
    }

    #[test]
    fn oco_same_bar_double_trigger_is_ambiguous() {
        let mut buy = intent("T1", Side::Buy, 110.0, 105.0, 120.0);
        let mut sell = intent("T2", Side::Sell, 90.0, 95.0, 80.0);
        buy.oco_group_id = Some(OcoGroupId::from("G1"));
        sell.oco_group_id = Some(OcoGroupId::from("G1"));
        // Both levels crossed intrabar from an open between them.
        let bars = spy(vec![bar(0, 100.0, 111.0, 89.0, 100.0)]);
        let result = run(vec![buy, sell], bars);

        assert_eq!(
            reasons(&result),
            vec![
                FillReason::OrderAmbiguousNoFill,
                FillReason::OrderAmbiguousNoFill
            ]
        );
    }

    #[test]
    fn oco_gap_side_wins_over_intrabar_side() {
        let mut buy = intent("T1", Side::Buy, 110.0, 105.0, 120.0);
        let mut sell = intent("T2", Side::Sell, 90.0, 95.0, 80.0);
        buy.oco_group_id = Some(OcoGroupId::from("G1"));
        sell.oco_group_id = Some(OcoGroupId::from("G1"));
        // Opens above the buy trigger (gap fill at open), then trades down
        // through the sell trigger intrabar. The open comes first.
        let bars = spy(vec![bar(0, 112.0, 113.0, 89.0, 95.0)]);
        let result = run(vec![buy, sell], bars);

        let entry = result
            .fills
            .iter()
            .find(|f| f.reason == FillReason::SignalFill)
            .unwrap();
        assert_eq!(entry.template_id, TemplateId::from("T1"));
        assert_eq!(entry.price, 112.0);
        assert!(result
            .fills
            .iter()
            .any(|f| f.reason == FillReason::OrderCancelledOco
                && f.template_id == TemplateId::from("T2")));
    }

    #[test]
    fn netting_rejects_second_entry_for_open_symbol() {
        let first = intent("T1", Side::Buy, 100.5, 95.0, 110.0);
        let mut second = intent("T2", Side::Buy, 101.0, 95.0, 110.0);
        second.valid_from = ts(5);
        let bars = spy(vec![
            bar(0, 100.0, 101.0, 99.5, 100.8),
            bar(5, 100.8, 101.5, 100.2, 101.2),
        ]);
        let result = run(vec![first, second], bars);

        let signal_fills: Vec<_> = result
            .fills
            .iter()
            .filter(|f| f.reason == FillReason::SignalFill)
            .collect();
        assert_eq!(signal_fills.len(), 1);
        assert_eq!(signal_fills[0].template_id, TemplateId::from("T1"));
        assert!(result
            .fills
            .iter()
            .any(|f| f.reason == FillReason::OrderRejectedNettingOpenPosition
                && f.template_id == TemplateId::from("T2")));
    }

    #[test]
    fn entry_allowed_after_position_closes() {
        let first = intent("T1", Side::Buy, 100.5, 98.0, 104.0);
        let mut second = intent("T2", Side::Buy, 104.5, 100.0, 108.0);
        second.valid_from = ts(5);
        let bars = spy(vec![
            bar(0, 100.0, 101.0, 99.5, 100.8),
            // Exit at the 104 target, then cross 104.5 in the same bar: the
            // exit frees the slot before entries are evaluated.
            bar(5, 100.8, 105.0, 100.2, 104.8),
        ]);
        let result = run(vec![first, second], bars);

        let signal_fills = result
            .fills
            .iter()
            .filter(|f| f.reason == FillReason::SignalFill)
            .count();
        assert_eq!(signal_fills, 2);
    }

    #[test]
    fn session_end_close_snaps_to_last_bar_and_records_gap() {
        // Window ends at minute 30; the last bar is at minute 10.
        let bars = spy(vec![
            bar(0, 100.0, 101.0, 99.5, 100.8),
            bar(5, 100.8, 101.2, 100.5, 101.0),
            bar(10, 101.0, 101.4, 100.8, 101.1),
        ]);
        let i = intent("T1", Side::Buy, 100.5, 95.0, 120.0);
        let result = run(vec![i], bars);

        let exit = result.fills.iter().find(|f| f.reason.is_exit()).unwrap();
        assert_eq!(exit.reason, FillReason::SessionEnd);
        assert_eq!(exit.ts, ts(10));
        assert_eq!(exit.price, 101.1); // last bar's close
        assert_eq!(result.gap_stats.session_end_snap_count, 1);
        assert_eq!(result.gap_stats.bars_gap_max_seconds, 20 * 60);
        // 20 minutes against a 5-minute median gap.
        assert_eq!(result.gap_stats.bars_gap_over_2x_median, 1);
    }

    #[test]
    fn session_end_close_on_boundary_bar_uses_its_open() {
        let bars = spy(vec![
            bar(0, 100.0, 101.0, 99.5, 100.8),
            bar(30, 101.0, 101.4, 100.8, 101.1), // exactly at valid_to
        ]);
        let i = intent("T1", Side::Buy, 100.5, 95.0, 120.0);
        let result = run(vec![i], bars);

        let exit = result.fills.iter().find(|f| f.reason.is_exit()).unwrap();
        assert_eq!(exit.ts, ts(30));
        assert_eq!(exit.price, 101.0); // boundary bar's open, not its close
        assert_eq!(result.gap_stats.session_end_snap_count, 0);
    }

    #[test]
    fn leave_open_policy_surfaces_template() {
        let bars = spy(vec![bar(0, 100.0, 101.0, 99.5, 100.8)]);
        let i = intent("T1", Side::Buy, 100.5, 95.0, 120.0);
        let cfg = SimConfig {
            qty: 1.0,
            exhausted_data: ExhaustedDataPolicy::LeaveOpen,
        };
        let result = simulate(vec![i], &bars, &cfg).unwrap();

        assert_eq!(result.left_open, vec![TemplateId::from("T1")]);
        assert!(!result.fills.iter().any(|f| f.reason.is_exit()));
    }

    #[test]
    fn malformed_intent_rejected_batch_continues() {
        let good = intent("T1", Side::Buy, 100.5, 98.0, 104.0);
        let mut bad = intent("T2", Side::Buy, -5.0, 98.0, 104.0);
        bad.template_id = TemplateId::from("T2");
        let bars = spy(vec![
            bar(0, 100.0, 101.0, 99.5, 100.8),
            bar(5, 100.8, 104.5, 100.2, 104.2),
        ]);
        let result = run(vec![good, bad], bars);

        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].template_id, TemplateId::from("T2"));
        assert!(result
            .fills
            .iter()
            .any(|f| f.reason == FillReason::SignalFill));
    }

    #[test]
    fn output_is_invariant_to_intent_order() {
        let a = intent("T1", Side::Buy, 100.5, 98.0, 104.0);
        let mut b = intent("T2", Side::Buy, 100.6, 98.0, 104.0);
        b.valid_from = ts(5);
        let bars = || {
            spy(vec![
                bar(0, 100.0, 101.0, 99.5, 100.8),
                bar(5, 100.8, 101.5, 100.2, 101.2),
            ])
        };
        let r1 = run(vec![a.clone(), b.clone()], bars());
        let r2 = run(vec![b, a], bars());
        assert_eq!(
            serde_json::to_string(&r1.fills).unwrap(),
            serde_json::to_string(&r2.fills).unwrap()
        );
    }
}
