//! Validity-window computation for pending orders.
//!
//! A window `[valid_from, valid_to)` is derived purely from the signal
//! timestamp, the bar timeframe, and the session calendar — never from
//! anything observed after `signal_ts`.

use super::SessionCalendar;
use crate::domain::ValidToReason;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// When the order goes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidFromPolicy {
    /// Live immediately at the signal timestamp.
    SignalTs,
    /// Live one bar-interval after the signal timestamp.
    NextBar,
}

/// How long the order stays live.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidityPolicy {
    /// `valid_to = valid_from + timeframe`.
    OneBar,
    /// `valid_to = valid_from + minutes`, optionally clamped to the end of
    /// the session containing `valid_from`.
    FixedMinutes { minutes: i64, clamp_to_session: bool },
    /// `valid_to` is the end of the session window containing `valid_from`.
    ///
    /// Computed from `valid_from`, not from `signal_ts`: under a next-bar
    /// start the effective window begin may sit past the boundary the signal
    /// saw, and anchoring on the signal would produce a zero or negative
    /// window.
    SessionEnd,
}

impl ValidityPolicy {
    pub fn valid_to_reason(&self) -> ValidToReason {
        match self {
            ValidityPolicy::OneBar => ValidToReason::OneBar,
            ValidityPolicy::FixedMinutes { .. } => ValidToReason::FixedMinutes,
            ValidityPolicy::SessionEnd => ValidToReason::SessionEnd,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WindowError {
    #[error("timestamp {ts} falls outside every configured session window")]
    SessionBoundary { ts: DateTime<Utc> },

    #[error("computed window is empty: valid_from={valid_from}, valid_to={valid_to}")]
    InvalidWindow {
        valid_from: DateTime<Utc>,
        valid_to: DateTime<Utc>,
    },

    #[error("timeframe must be positive, got {minutes} minutes")]
    NonPositiveTimeframe { minutes: i64 },
}

/// Compute the admission window for a signal.
///
/// Fails when `valid_from` lands outside every session window (the order is
/// rejected, not silently re-windowed) or when the computed window is empty.
pub fn compute_window(
    signal_ts: DateTime<Utc>,
    timeframe_minutes: i64,
    calendar: &SessionCalendar,
    policy: ValidityPolicy,
    valid_from_policy: ValidFromPolicy,
) -> Result<(DateTime<Utc>, DateTime<Utc>), WindowError> {
    if timeframe_minutes <= 0 {
        return Err(WindowError::NonPositiveTimeframe {
            minutes: timeframe_minutes,
        });
    }
    let timeframe = Duration::minutes(timeframe_minutes);

    let valid_from = match valid_from_policy {
        ValidFromPolicy::SignalTs => signal_ts,
        ValidFromPolicy::NextBar => signal_ts + timeframe,
    };

    let (_, session_end) = calendar
        .session_containing(valid_from)
        .ok_or(WindowError::SessionBoundary { ts: valid_from })?;

    let valid_to = match policy {
        ValidityPolicy::OneBar => valid_from + timeframe,
        ValidityPolicy::FixedMinutes {
            minutes,
            clamp_to_session,
        } => {
            let unclamped = valid_from + Duration::minutes(minutes);
            if clamp_to_session {
                unclamped.min(session_end)
            } else {
                unclamped
            }
        }
        ValidityPolicy::SessionEnd => session_end,
    };

    if valid_to <= valid_from {
        return Err(WindowError::InvalidWindow {
            valid_from,
            valid_to,
        });
    }
    Ok((valid_from, valid_to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cal() -> SessionCalendar {
        SessionCalendar::rth_us_equities()
    }

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        // 2024-01-02 is a Tuesday; RTH is 14:30-21:00 UTC that week.
        Utc.with_ymd_and_hms(2024, 1, 2, h, m, 0).unwrap()
    }

    #[test]
    fn one_bar_window_is_one_timeframe_wide() {
        let (vf, vt) =
            compute_window(ts(14, 35), 5, &cal(), ValidityPolicy::OneBar, ValidFromPolicy::SignalTs)
                .unwrap();
        assert_eq!(vf, ts(14, 35));
        assert_eq!(vt - vf, Duration::minutes(5));
    }

    #[test]
    fn next_bar_shifts_valid_from_by_one_timeframe() {
        let (vf, vt) =
            compute_window(ts(14, 35), 5, &cal(), ValidityPolicy::OneBar, ValidFromPolicy::NextBar)
                .unwrap();
        assert_eq!(vf, ts(14, 40));
        assert_eq!(vt, ts(14, 45));
    }

    #[test]
    fn fixed_minutes_unclamped() {
        let policy = ValidityPolicy::FixedMinutes {
            minutes: 90,
            clamp_to_session: false,
        };
        let (vf, vt) =
            compute_window(ts(20, 0), 5, &cal(), policy, ValidFromPolicy::SignalTs).unwrap();
        assert_eq!(vt, vf + Duration::minutes(90));
    }

    #[test]
    fn fixed_minutes_clamps_to_session_close() {
        let policy = ValidityPolicy::FixedMinutes {
            minutes: 90,
            clamp_to_session: true,
        };
        let (_, vt) =
            compute_window(ts(20, 0), 5, &cal(), policy, ValidFromPolicy::SignalTs).unwrap();
        assert_eq!(vt, ts(21, 0)); // 16:00 New York
    }

    #[test]
    fn session_end_is_computed_from_valid_from_not_signal_ts() {
        // Signal fires inside the session; the next-bar start is still inside
        // and the window runs from there to the close.
        let (vf, vt) = compute_window(
            ts(20, 50),
            5,
            &cal(),
            ValidityPolicy::SessionEnd,
            ValidFromPolicy::NextBar,
        )
        .unwrap();
        assert_eq!(vf, ts(20, 55));
        assert_eq!(vt, ts(21, 0));
    }

    #[test]
    fn next_bar_past_session_close_is_a_boundary_error() {
        // Signal at 20:58, next bar starts 21:03 — after the 21:00 close.
        let err = compute_window(
            ts(20, 58),
            5,
            &cal(),
            ValidityPolicy::SessionEnd,
            ValidFromPolicy::NextBar,
        )
        .unwrap_err();
        assert!(matches!(err, WindowError::SessionBoundary { .. }));
    }

    #[test]
    fn signal_outside_session_is_rejected_not_rewindowed() {
        let err = compute_window(
            ts(13, 0), // premarket
            5,
            &cal(),
            ValidityPolicy::OneBar,
            ValidFromPolicy::SignalTs,
        )
        .unwrap_err();
        assert_eq!(err, WindowError::SessionBoundary { ts: ts(13, 0) });
    }

    #[test]
    fn zero_fixed_minutes_is_an_empty_window() {
        let policy = ValidityPolicy::FixedMinutes {
            minutes: 0,
            clamp_to_session: false,
        };
        let err =
            compute_window(ts(15, 0), 5, &cal(), policy, ValidFromPolicy::SignalTs).unwrap_err();
        assert!(matches!(err, WindowError::InvalidWindow { .. }));
    }

    #[test]
    fn non_positive_timeframe_is_rejected() {
        let err = compute_window(
            ts(15, 0),
            0,
            &cal(),
            ValidityPolicy::OneBar,
            ValidFromPolicy::SignalTs,
        )
        .unwrap_err();
        assert_eq!(err, WindowError::NonPositiveTimeframe { minutes: 0 });
    }
}
