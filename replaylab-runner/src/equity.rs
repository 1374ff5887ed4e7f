//! Equity curve and drawdown — pure functions over ledger entries.

use chrono::{DateTime, Utc};
use replaylab_core::ledger::LedgerEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts: DateTime<Utc>,
    pub equity: f64,
    pub drawdown_pct: f64,
}

/// One point per ledger entry (START included), with running peak drawdown.
pub fn equity_from_ledger(entries: &[LedgerEntry]) -> Vec<EquityPoint> {
    let mut peak = f64::MIN;
    entries
        .iter()
        .map(|e| {
            peak = peak.max(e.equity_after);
            let drawdown_pct = if peak > 0.0 {
                (peak - e.equity_after) / peak * 100.0
            } else {
                0.0
            };
            EquityPoint {
                ts: e.ts,
                equity: e.equity_after,
                drawdown_pct,
            }
        })
        .collect()
}

/// Build an equity curve from raw (timestamp, equity) samples, e.g. the
/// event engine's cash series.
pub fn equity_from_samples(samples: &[(DateTime<Utc>, f64)]) -> Vec<EquityPoint> {
    let mut peak = f64::MIN;
    samples
        .iter()
        .map(|&(ts, equity)| {
            peak = peak.max(equity);
            let drawdown_pct = if peak > 0.0 {
                (peak - equity) / peak * 100.0
            } else {
                0.0
            };
            EquityPoint {
                ts,
                equity,
                drawdown_pct,
            }
        })
        .collect()
}

/// Maximum drawdown over the curve, as a percentage of the running peak.
pub fn max_drawdown_pct(points: &[EquityPoint]) -> f64 {
    points
        .iter()
        .map(|p| p.drawdown_pct)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn samples(values: &[f64]) -> Vec<(DateTime<Utc>, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                (
                    Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap()
                        + chrono::Duration::minutes(i as i64),
                    v,
                )
            })
            .collect()
    }

    #[test]
    fn flat_curve_has_zero_drawdown() {
        let curve = equity_from_samples(&samples(&[100.0, 100.0, 100.0]));
        assert!(curve.iter().all(|p| p.drawdown_pct == 0.0));
    }

    #[test]
    fn drawdown_measured_from_running_peak() {
        let curve = equity_from_samples(&samples(&[100.0, 120.0, 90.0, 110.0]));
        assert_eq!(curve[1].drawdown_pct, 0.0);
        assert!((curve[2].drawdown_pct - 25.0).abs() < 1e-9); // (120-90)/120
        assert!((curve[3].drawdown_pct - (120.0 - 110.0) / 120.0 * 100.0).abs() < 1e-9);
        assert!((max_drawdown_pct(&curve) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn recovery_to_new_peak_resets_drawdown() {
        let curve = equity_from_samples(&samples(&[100.0, 90.0, 130.0]));
        assert_eq!(curve[2].drawdown_pct, 0.0);
    }
}
