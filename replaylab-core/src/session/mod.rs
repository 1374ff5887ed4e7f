//! Trading-session calendar and validity-window computation.

pub mod window;

pub use window::{compute_window, ValidFromPolicy, ValidityPolicy, WindowError};

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// One daily trading span in the calendar's local timezone, `[open, close)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSpan {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

/// A trading-session calendar: an exchange timezone, the weekdays that trade,
/// and the daily spans. An empty span list means continuous trading; the
/// session containing a timestamp is then its whole local day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCalendar {
    pub tz: Tz,
    pub trading_days: Vec<Weekday>,
    pub spans: Vec<SessionSpan>,
}

impl SessionCalendar {
    /// US equities regular trading hours: 09:30-16:00 America/New_York, Mon-Fri.
    pub fn rth_us_equities() -> Self {
        Self {
            tz: chrono_tz::America::New_York,
            trading_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            spans: vec![SessionSpan {
                open: NaiveTime::from_hms_opt(9, 30, 0).expect("valid time"),
                close: NaiveTime::from_hms_opt(16, 0, 0).expect("valid time"),
            }],
        }
    }

    /// Continuous 24/7 trading in the given timezone.
    pub fn all_hours(tz: Tz) -> Self {
        Self {
            tz,
            trading_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ],
            spans: Vec::new(),
        }
    }

    /// The UTC bounds of the session window containing `ts`, or `None` when
    /// `ts` falls outside every configured span.
    pub fn session_containing(
        &self,
        ts: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let local = ts.with_timezone(&self.tz);
        if !self.trading_days.contains(&local.weekday()) {
            return None;
        }
        let date = local.date_naive();
        let time = local.time();

        if self.spans.is_empty() {
            let start = self.local_to_utc(date.and_hms_opt(0, 0, 0)?)?;
            let end = self.local_to_utc((date + Duration::days(1)).and_hms_opt(0, 0, 0)?)?;
            return Some((start, end));
        }

        for span in &self.spans {
            if span.open <= time && time < span.close {
                let start = self.local_to_utc(date.and_time(span.open))?;
                let end = self.local_to_utc(date.and_time(span.close))?;
                return Some((start, end));
            }
        }
        None
    }

    /// Resolve a local wall-clock instant to UTC. On a DST ambiguity the
    /// earlier instant wins; inside a spring-forward gap there is no valid
    /// instant and the caller treats the timestamp as outside the session.
    fn local_to_utc(&self, naive: chrono::NaiveDateTime) -> Option<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
