//! Total, shuffle-invariant ordering over trade events.
//!
//! Sort key, in priority order: `(timestamp, kind, symbol, template_id, side)`
//! where EXIT sorts before ENTRY at a shared timestamp, so capital freed by a
//! close is available to size a new position at the same instant.
//!
//! `validate_event_order` re-walks an already-sorted sequence and reports the
//! first violation. It is used both as a runtime guard in front of the event
//! engine and as the oracle in the property tests.

use crate::domain::{EventKind, TradeEvent};
use chrono::{DateTime, Utc};

/// Sort events into the canonical total order. Identical input sets yield
/// identical sequences regardless of input iteration order.
pub fn order_events(mut events: Vec<TradeEvent>) -> Vec<TradeEvent> {
    events.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    events
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OrderingViolation {
    #[error("timestamps regress at index {index}: {prev} then {next}")]
    NonMonotonicTimestamp {
        index: usize,
        prev: DateTime<Utc>,
        next: DateTime<Utc>,
    },

    #[error("EXIT follows ENTRY at shared timestamp {ts} (index {index})")]
    ExitAfterEntry { index: usize, ts: DateTime<Utc> },
}

/// Check that a sequence is monotonic non-decreasing in time and that within
/// a shared timestamp no EXIT follows an ENTRY.
pub fn validate_event_order(events: &[TradeEvent]) -> Result<(), OrderingViolation> {
    for i in 1..events.len() {
        let prev = &events[i - 1];
        let next = &events[i];
        if next.ts < prev.ts {
            return Err(OrderingViolation::NonMonotonicTimestamp {
                index: i,
                prev: prev.ts,
                next: next.ts,
            });
        }
        if next.ts == prev.ts
            && prev.kind == EventKind::Entry
            && next.kind == EventKind::Exit
        {
            return Err(OrderingViolation::ExitAfterEntry {
                index: i,
                ts: next.ts,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Side, TemplateId};
    use chrono::TimeZone;

    fn ev(min: u32, kind: EventKind, symbol: &str, id: &str) -> TradeEvent {
        TradeEvent {
            ts: Utc.with_ymd_and_hms(2024, 1, 2, 15, min, 0).unwrap(),
            kind,
            symbol: symbol.into(),
            template_id: TemplateId::from(id),
            side: Side::Buy,
            price: 100.0,
        }
    }

    #[test]
    fn exits_precede_entries_at_shared_timestamp() {
        let events = vec![
            ev(0, EventKind::Entry, "SPY", "T1"),
            ev(0, EventKind::Exit, "QQQ", "T2"),
        ];
        let ordered = order_events(events);
        assert_eq!(ordered[0].kind, EventKind::Exit);
        assert_eq!(ordered[1].kind, EventKind::Entry);
        validate_event_order(&ordered).unwrap();
    }

    #[test]
    fn ties_break_by_symbol_then_template() {
        let events = vec![
            ev(0, EventKind::Entry, "SPY", "T2"),
            ev(0, EventKind::Entry, "SPY", "T1"),
            ev(0, EventKind::Entry, "AAPL", "T3"),
        ];
        let ordered = order_events(events);
        assert_eq!(ordered[0].symbol, "AAPL");
        assert_eq!(ordered[1].template_id, TemplateId::from("T1"));
        assert_eq!(ordered[2].template_id, TemplateId::from("T2"));
    }

    #[test]
    fn validator_flags_entry_before_exit() {
        let bad = vec![
            ev(0, EventKind::Entry, "SPY", "T1"),
            ev(0, EventKind::Exit, "SPY", "T2"),
        ];
        assert!(matches!(
            validate_event_order(&bad),
            Err(OrderingViolation::ExitAfterEntry { index: 1, .. })
        ));
    }

    #[test]
    fn validator_flags_time_regression() {
        let bad = vec![
            ev(5, EventKind::Entry, "SPY", "T1"),
            ev(0, EventKind::Exit, "SPY", "T2"),
        ];
        assert!(matches!(
            validate_event_order(&bad),
            Err(OrderingViolation::NonMonotonicTimestamp { index: 1, .. })
        ));
    }

    #[test]
    fn validator_accepts_exit_entry_exit_across_timestamps() {
        let good = vec![
            ev(0, EventKind::Exit, "SPY", "T1"),
            ev(0, EventKind::Entry, "SPY", "T2"),
            ev(1, EventKind::Exit, "SPY", "T2"),
        ];
        validate_event_order(&good).unwrap();
    }
}
