//! Intent — a sanitized order request, valid only inside a bounded window.

use super::ids::{OcoGroupId, TemplateId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order direction.
///
/// The `Ord` derive (Buy < Sell) participates in the event sort key; do not
/// reorder the variants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Why `valid_to` lands where it does — a scheduled boundary, not an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidToReason {
    OneBar,
    FixedMinutes,
    SessionEnd,
}

impl ValidToReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidToReason::OneBar => "one_bar",
            ValidToReason::FixedMinutes => "fixed_minutes",
            ValidToReason::SessionEnd => "session_end",
        }
    }
}

/// A sanitized order intent. Created once by the signal layer at the close of
/// the triggering bar; immutable afterwards.
///
/// Invariant: `valid_to > valid_from`, and both are derived only from
/// information known at or before `signal_ts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub template_id: TemplateId,
    pub signal_ts: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_price: f64,
    pub take_profit_price: f64,
    pub oco_group_id: Option<OcoGroupId>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub valid_to_reason: ValidToReason,
}

impl Intent {
    /// Admission check for malformed intents. A failure rejects this template
    /// only; the batch continues.
    pub fn validate(&self) -> Result<(), RejectReason> {
        if !(self.entry_price > 0.0) {
            return Err(RejectReason::NonPositiveEntryPrice);
        }
        if !(self.stop_price > 0.0) {
            return Err(RejectReason::NonPositiveStopPrice);
        }
        if !(self.take_profit_price > 0.0) {
            return Err(RejectReason::NonPositiveTakeProfitPrice);
        }
        if self.valid_to <= self.valid_from {
            return Err(RejectReason::EmptyValidityWindow);
        }
        match self.side {
            Side::Buy => {
                if self.stop_price >= self.entry_price
                    || self.take_profit_price <= self.entry_price
                {
                    return Err(RejectReason::InvertedPriceLevels);
                }
            }
            Side::Sell => {
                if self.stop_price <= self.entry_price
                    || self.take_profit_price >= self.entry_price
                {
                    return Err(RejectReason::InvertedPriceLevels);
                }
            }
        }
        Ok(())
    }
}

/// Per-template admission rejection. Distinct from [`super::fill::FillReason`]:
/// these intents never reach the bar loop at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NonPositiveEntryPrice,
    NonPositiveStopPrice,
    NonPositiveTakeProfitPrice,
    EmptyValidityWindow,
    InvertedPriceLevels,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::NonPositiveEntryPrice => "non_positive_entry_price",
            RejectReason::NonPositiveStopPrice => "non_positive_stop_price",
            RejectReason::NonPositiveTakeProfitPrice => "non_positive_take_profit_price",
            RejectReason::EmptyValidityWindow => "empty_validity_window",
            RejectReason::InvertedPriceLevels => "inverted_price_levels",
        }
    }
}

/// An intent that failed admission, with its machine-readable reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedIntent {
    pub template_id: TemplateId,
    pub reason: RejectReason,
}
