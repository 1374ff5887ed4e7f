//! Intent sanitizer — the structural defense against lookahead bias.
//!
//! Raw signal records may carry outcome columns written by research tooling
//! (`exit_ts`, `fill_price`, `pnl_net`, debug trigger dumps). None of that
//! information existed when the order decision was made, so none of it may
//! reach the engine. The sanitizer strips every field that is not explicitly
//! allowed and cross-checks every timestamp-bearing field against the moment
//! the intent was generated.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Base columns a signal source is allowed to provide (canonical names plus
/// the aliases the boundary adapter resolves).
const BASE_ALLOW: &[&str] = &[
    "signal_ts",
    "timestamp",
    "ts",
    "symbol",
    "ticker",
    "side",
    "direction",
    "entry_price",
    "entry",
    "stop_price",
    "stop",
    "stop_loss",
    "take_profit_price",
    "take_profit",
    "tp",
    "template_id",
    "id",
    "oco_group_id",
    "oco_group",
    "qty",
    "note",
    "debug_pattern",
    "debug_range_width",
];

/// Outcome columns that can only be known after the fact.
const DENY_EXACT: &[&str] = &["exit_ts", "exit_reason"];
const DENY_PREFIX: &[&str] = &["fill_", "pnl", "realized_", "trade_", "debug_trigger", "debug_exit"];

/// Scheduled-validity fields. These legitimately reference a future
/// timestamp: they describe a scheduled boundary, not an observed event.
const SCHEDULED_ALLOW: &[&str] = &["valid_from", "valid_to", "valid_to_reason"];
const SCHEDULED_PREFIX: &str = "valid_to_";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SanitizeError {
    #[error(
        "lookahead field `{field}`: timestamp {value_ts} is later than intent generation {generated_ts}"
    )]
    LookaheadField {
        field: String,
        value_ts: DateTime<Utc>,
        generated_ts: DateTime<Utc>,
    },

    #[error("field `{field}` looks like a timestamp but cannot be parsed as an aware one: {value}")]
    UnparseableTimestamp { field: String, value: String },
}

fn denied(name: &str) -> bool {
    DENY_EXACT.contains(&name) || DENY_PREFIX.iter().any(|p| name.starts_with(p))
}

fn scheduled(name: &str) -> bool {
    SCHEDULED_ALLOW.contains(&name) || name.starts_with(SCHEDULED_PREFIX)
}

fn parse_aware(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Strip every field that could leak future information.
///
/// - Deny-listed outcome fields are always dropped.
/// - Scheduled-validity fields pass through untouched.
/// - Base-allowed fields whose name contains `ts` must parse as an aware
///   timestamp at or before `intent_generated_ts`; a violation fails the
///   record in strict mode and is logged and dropped otherwise.
/// - Anything not on an allow-list is dropped.
pub fn sanitize(
    raw: &BTreeMap<String, Value>,
    intent_generated_ts: DateTime<Utc>,
    strict: bool,
) -> Result<BTreeMap<String, Value>, SanitizeError> {
    let mut out = BTreeMap::new();

    for (name, value) in raw {
        if denied(name) {
            tracing::debug!(field = %name, "sanitizer dropped outcome field");
            continue;
        }
        if scheduled(name) {
            out.insert(name.clone(), value.clone());
            continue;
        }
        if !BASE_ALLOW.contains(&name.as_str()) {
            tracing::debug!(field = %name, "sanitizer dropped unlisted field");
            continue;
        }
        if name.contains("ts") {
            match parse_aware(value) {
                Some(value_ts) if value_ts > intent_generated_ts => {
                    if strict {
                        return Err(SanitizeError::LookaheadField {
                            field: name.clone(),
                            value_ts,
                            generated_ts: intent_generated_ts,
                        });
                    }
                    tracing::warn!(
                        field = %name,
                        %value_ts,
                        %intent_generated_ts,
                        "dropping lookahead timestamp field"
                    );
                    continue;
                }
                Some(_) => {}
                None => {
                    if strict {
                        return Err(SanitizeError::UnparseableTimestamp {
                            field: name.clone(),
                            value: value.to_string(),
                        });
                    }
                    tracing::warn!(field = %name, "dropping unparseable timestamp field");
                    continue;
                }
            }
        }
        out.insert(name.clone(), value.clone());
    }

    Ok(out)
}
