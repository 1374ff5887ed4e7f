//! Bar — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single symbol, stamped at the bar's open time (UTC).
///
/// Bars arrive from an external store; the engine never fetches or resamples.
/// Within one symbol's series timestamps must be strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Basic OHLC sanity check: high is the top, low is the bottom, prices positive.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && !self.open.is_nan()
            && !self.high.is_nan()
            && !self.low.is_nan()
            && !self.close.is_nan()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BarError {
    #[error("bar series for {symbol} is not strictly increasing at {ts} (index {index})")]
    NonMonotonicTimestamp {
        symbol: String,
        ts: DateTime<Utc>,
        index: usize,
    },

    #[error("bar series contains mixed symbols: expected {expected}, found {found} at index {index}")]
    MixedSymbols {
        expected: String,
        found: String,
        index: usize,
    },

    #[error("insane OHLC values for {symbol} at {ts}")]
    InsaneBar { symbol: String, ts: DateTime<Utc> },
}

/// Validate one symbol's series: single symbol, sane OHLC, strictly
/// increasing timestamps (duplicates included in the violation).
pub fn validate_series(bars: &[Bar]) -> Result<(), BarError> {
    let Some(first) = bars.first() else {
        return Ok(());
    };
    for (i, bar) in bars.iter().enumerate() {
        if bar.symbol != first.symbol {
            return Err(BarError::MixedSymbols {
                expected: first.symbol.clone(),
                found: bar.symbol.clone(),
                index: i,
            });
        }
        if !bar.is_sane() {
            return Err(BarError::InsaneBar {
                symbol: bar.symbol.clone(),
                ts: bar.ts,
            });
        }
        if i > 0 && bar.ts <= bars[i - 1].ts {
            return Err(BarError::NonMonotonicTimestamp {
                symbol: bar.symbol.clone(),
                ts: bar.ts,
                index: i,
            });
        }
    }
    Ok(())
}
