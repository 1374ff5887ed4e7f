//! Serializable run configuration.

use replaylab_core::costs::CostModel;
use replaylab_core::compound::SizeRounding;
use replaylab_core::ledger::TimestampMode;
use replaylab_core::session::{SessionCalendar, ValidFromPolicy, ValidityPolicy};
use replaylab_core::sim::ExhaustedDataPolicy;
use serde::{Deserialize, Serialize};

/// Which execution path a run uses. The two variants carry their own sizing
/// configuration, so the fixed-quantity and compounding paths cannot be
/// partially mixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Fill simulation with a fixed quantity per template, ledger replay.
    FixedQty { qty: f64 },
    /// Event engine: size recomputed from current cash at every entry.
    Compounding {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fixed_qty: Option<f64>,
        rounding: SizeRounding,
    },
}

/// Everything needed to reproduce a backtest run. Loadable from TOML;
/// hashable into a deterministic run ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub timeframe_minutes: i64,
    pub calendar: SessionCalendar,
    pub valid_from_policy: ValidFromPolicy,
    pub validity_policy: ValidityPolicy,
    pub cost: CostModel,
    pub initial_cash: f64,
    /// Strict sanitizer: a lookahead field fails the record instead of being
    /// logged and dropped.
    pub strict_sanitizer: bool,
    pub ledger_mode: TimestampMode,
    pub exhausted_data: ExhaustedDataPolicy,
    pub execution: ExecutionMode,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("initial_cash must be positive, got {0}")]
    NonPositiveInitialCash(f64),

    #[error("timeframe_minutes must be positive, got {0}")]
    NonPositiveTimeframe(i64),

    #[error("fixed-qty execution requires a positive qty, got {0}")]
    NonPositiveQty(f64),

    #[error("negative cost rate: commission_bps={commission_bps}, slippage_bps={slippage_bps}")]
    NegativeCostRate {
        commission_bps: f64,
        slippage_bps: f64,
    },
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_cash <= 0.0 {
            return Err(ConfigError::NonPositiveInitialCash(self.initial_cash));
        }
        if self.timeframe_minutes <= 0 {
            return Err(ConfigError::NonPositiveTimeframe(self.timeframe_minutes));
        }
        if let ExecutionMode::FixedQty { qty } = self.execution {
            if qty <= 0.0 {
                return Err(ConfigError::NonPositiveQty(qty));
            }
        }
        if self.cost.commission_bps < 0.0 || self.cost.slippage_bps < 0.0 {
            return Err(ConfigError::NegativeCostRate {
                commission_bps: self.cost.commission_bps,
                slippage_bps: self.cost.slippage_bps,
            });
        }
        Ok(())
    }

    /// Deterministic content hash of this configuration. Two identical
    /// configs share a hash and can be compared across runs.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_string(self).expect("RunConfig must serialize");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// A conservative default: US equities RTH, 5-minute bars, one-bar
    /// windows, fixed single-share quantity, strict everything.
    pub fn default_rth() -> Self {
        Self {
            timeframe_minutes: 5,
            calendar: SessionCalendar::rth_us_equities(),
            valid_from_policy: ValidFromPolicy::SignalTs,
            validity_policy: ValidityPolicy::OneBar,
            cost: CostModel::free(),
            initial_cash: 100_000.0,
            strict_sanitizer: true,
            ledger_mode: TimestampMode::Strict,
            exhausted_data: ExhaustedDataPolicy::SnapToLastBar,
            execution: ExecutionMode::FixedQty { qty: 1.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(RunConfig::default_rth().validate().is_ok());
    }

    #[test]
    fn non_positive_cash_rejected() {
        let mut cfg = RunConfig::default_rth();
        cfg.initial_cash = 0.0;
        assert_eq!(cfg.validate(), Err(ConfigError::NonPositiveInitialCash(0.0)));
    }

    #[test]
    fn non_positive_qty_rejected() {
        let mut cfg = RunConfig::default_rth();
        cfg.execution = ExecutionMode::FixedQty { qty: 0.0 };
        assert_eq!(cfg.validate(), Err(ConfigError::NonPositiveQty(0.0)));
    }

    #[test]
    fn config_hash_is_deterministic_and_sensitive() {
        let a = RunConfig::default_rth();
        let b = RunConfig::default_rth();
        assert_eq!(a.config_hash(), b.config_hash());

        let mut c = RunConfig::default_rth();
        c.initial_cash = 50_000.0;
        assert_ne!(a.config_hash(), c.config_hash());
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = RunConfig::default_rth();
        let text = cfg.to_toml().unwrap();
        let back = RunConfig::from_toml(&text).unwrap();
        assert_eq!(cfg.config_hash(), back.config_hash());
    }

    #[test]
    fn execution_mode_is_tagged_in_serde() {
        let json =
            serde_json::to_string(&ExecutionMode::FixedQty { qty: 2.0 }).unwrap();
        assert!(json.contains("\"mode\":\"fixed_qty\""));
        let json = serde_json::to_string(&ExecutionMode::Compounding {
            fixed_qty: None,
            rounding: SizeRounding::Floor,
        })
        .unwrap();
        assert!(json.contains("\"mode\":\"compounding\""));
    }
}
