//! Signal boundary adapter.
//!
//! Upstream pattern detectors emit loosely-shaped records (object-or-mapping
//! with aliased field names: `entry` vs `entry_price`, `LONG` vs `BUY`).
//! Aliases are resolved exactly once, here, at the boundary; the engine only
//! ever sees the strict [`SignalRecord`].

use super::ids::{OcoGroupId, TemplateId};
use super::intent::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A strictly-typed signal, post-sanitization and post-alias-resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub template_id: TemplateId,
    pub signal_ts: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_price: f64,
    pub take_profit_price: f64,
    pub oco_group_id: Option<OcoGroupId>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AdapterError {
    #[error("signal record is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not a number: {value}")]
    BadNumber { field: &'static str, value: String },

    #[error("unrecognized side value: {0}")]
    BadSide(String),

    #[error("field `{field}` is not an RFC 3339 timestamp: {value}")]
    BadTimestamp { field: &'static str, value: String },

    #[error("field `{field}` carries a naive timestamp; timezone info is required")]
    NaiveTimestamp { field: &'static str },
}

const TS_ALIASES: &[&str] = &["signal_ts", "timestamp", "ts"];
const SYMBOL_ALIASES: &[&str] = &["symbol", "ticker"];
const SIDE_ALIASES: &[&str] = &["side", "direction"];
const ENTRY_ALIASES: &[&str] = &["entry_price", "entry"];
const STOP_ALIASES: &[&str] = &["stop_price", "stop", "stop_loss"];
const TP_ALIASES: &[&str] = &["take_profit_price", "take_profit", "tp"];
const TEMPLATE_ALIASES: &[&str] = &["template_id", "id"];
const OCO_ALIASES: &[&str] = &["oco_group_id", "oco_group"];

/// Convert one sanitized field map into a [`SignalRecord`].
pub fn signal_from_fields(
    fields: &BTreeMap<String, Value>,
) -> Result<SignalRecord, AdapterError> {
    let ts_raw = first_present(fields, TS_ALIASES)
        .ok_or(AdapterError::MissingField("signal_ts"))?;
    let signal_ts = parse_aware_ts("signal_ts", ts_raw)?;

    let symbol = first_present(fields, SYMBOL_ALIASES)
        .and_then(Value::as_str)
        .ok_or(AdapterError::MissingField("symbol"))?
        .to_string();

    let side_raw = first_present(fields, SIDE_ALIASES)
        .and_then(Value::as_str)
        .ok_or(AdapterError::MissingField("side"))?;
    let side = parse_side(side_raw)?;

    let template_id = first_present(fields, TEMPLATE_ALIASES)
        .and_then(Value::as_str)
        .map(TemplateId::from)
        .ok_or(AdapterError::MissingField("template_id"))?;

    let oco_group_id = first_present(fields, OCO_ALIASES)
        .and_then(Value::as_str)
        .map(OcoGroupId::from);

    Ok(SignalRecord {
        template_id,
        signal_ts,
        symbol,
        side,
        entry_price: number_field(fields, ENTRY_ALIASES, "entry_price")?,
        stop_price: number_field(fields, STOP_ALIASES, "stop_price")?,
        take_profit_price: number_field(fields, TP_ALIASES, "take_profit_price")?,
        oco_group_id,
    })
}

fn first_present<'a>(
    fields: &'a BTreeMap<String, Value>,
    aliases: &[&str],
) -> Option<&'a Value> {
    aliases.iter().find_map(|name| fields.get(*name))
}

fn number_field(
    fields: &BTreeMap<String, Value>,
    aliases: &[&str],
    canonical: &'static str,
) -> Result<f64, AdapterError> {
    let value = first_present(fields, aliases)
        .ok_or(AdapterError::MissingField(canonical))?;
    value.as_f64().ok_or_else(|| AdapterError::BadNumber {
        field: canonical,
        value: value.to_string(),
    })
}

fn parse_side(raw: &str) -> Result<Side, AdapterError> {
    match raw.to_ascii_uppercase().as_str() {
        "BUY" | "LONG" => Ok(Side::Buy),
        "SELL" | "SHORT" => Ok(Side::Sell),
        _ => Err(AdapterError::BadSide(raw.to_string())),
    }
}

fn parse_aware_ts(field: &'static str, value: &Value) -> Result<DateTime<Utc>, AdapterError> {
    let s = value.as_str().ok_or_else(|| AdapterError::BadTimestamp {
        field,
        value: value.to_string(),
    })?;
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => {
            // A parseable naive datetime is a distinct, harder failure than
            // garbage: it means the producer silently dropped the zone.
            if chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
                || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
            {
                Err(AdapterError::NaiveTimestamp { field })
            } else {
                Err(AdapterError::BadTimestamp {
                    field,
                    value: s.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn base() -> BTreeMap<String, Value> {
        fields(&[
            ("template_id", json!("T0001")),
            ("signal_ts", json!("2024-01-02T14:30:00+00:00")),
            ("symbol", json!("SPY")),
            ("side", json!("BUY")),
            ("entry_price", json!(100.0)),
            ("stop_price", json!(98.0)),
            ("take_profit_price", json!(104.0)),
        ])
    }

    #[test]
    fn canonical_names_resolve() {
        let rec = signal_from_fields(&base()).unwrap();
        assert_eq!(rec.symbol, "SPY");
        assert_eq!(rec.side, Side::Buy);
        assert_eq!(rec.entry_price, 100.0);
    }

    #[test]
    fn aliases_resolve() {
        let mut f = base();
        f.remove("entry_price");
        f.insert("entry".into(), json!(101.5));
        f.remove("side");
        f.insert("side".into(), json!("LONG"));
        let rec = signal_from_fields(&f).unwrap();
        assert_eq!(rec.entry_price, 101.5);
        assert_eq!(rec.side, Side::Buy);
    }

    #[test]
    fn short_maps_to_sell() {
        let mut f = base();
        f.insert("side".into(), json!("short"));
        assert_eq!(signal_from_fields(&f).unwrap().side, Side::Sell);
    }

    #[test]
    fn missing_stop_is_an_error() {
        let mut f = base();
        f.remove("stop_price");
        assert_eq!(
            signal_from_fields(&f),
            Err(AdapterError::MissingField("stop_price"))
        );
    }

    #[test]
    fn naive_timestamp_is_a_hard_error() {
        let mut f = base();
        f.insert("signal_ts".into(), json!("2024-01-02T14:30:00"));
        assert_eq!(
            signal_from_fields(&f),
            Err(AdapterError::NaiveTimestamp { field: "signal_ts" })
        );
    }

    #[test]
    fn unknown_side_is_an_error() {
        let mut f = base();
        f.insert("side".into(), json!("HOLD"));
        assert!(matches!(
            signal_from_fields(&f),
            Err(AdapterError::BadSide(_))
        ));
    }
}
