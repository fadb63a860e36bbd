//! Business-hours gate for automated SMS.
//!
//! A window is written `HH:MM-HH:MM` and evaluated in business-local time,
//! which is Perth (UTC+8, no daylight saving). Both ends are inclusive at
//! minute granularity, so `09:00-17:00` still allows a send at 17:00:59.
//! A window whose end is earlier than its start wraps past midnight.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Timelike, Utc};
use tracing::warn;

use fp_core::constants::PERTH_UTC_OFFSET_HOURS;
use fp_core::error::{FpError, FpResult};

/// A parsed `HH:MM-HH:MM` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl SendWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Whether a local wall-clock time falls inside the window.
    pub fn contains(&self, local: NaiveTime) -> bool {
        let minute = minute_of_day(local);
        let start = minute_of_day(self.start);
        let end = minute_of_day(self.end);
        if start <= end {
            minute >= start && minute <= end
        } else {
            minute >= start || minute <= end
        }
    }
}

impl FromStr for SendWindow {
    type Err = FpError;

    fn from_str(s: &str) -> FpResult<Self> {
        let (start, end) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| FpError::Validation(format!("send window '{s}' must be HH:MM-HH:MM")))?;
        Ok(Self {
            start: parse_clock(start, s)?,
            end: parse_clock(end, s)?,
        })
    }
}

impl fmt::Display for SendWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

fn parse_clock(part: &str, whole: &str) -> FpResult<NaiveTime> {
    NaiveTime::parse_from_str(part.trim(), "%H:%M")
        .map_err(|_| FpError::Validation(format!("send window '{whole}' has a bad time '{}'", part.trim())))
}

fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

/// Fixed business timezone for an hour offset. Out-of-range offsets fall
/// back to Perth.
pub fn business_offset(utc_offset_hours: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_hours * 3600)
        .or_else(|| FixedOffset::east_opt(PERTH_UTC_OFFSET_HOURS * 3600))
        .unwrap_or_else(|| Utc.fix())
}

/// Start of a calendar day in business local time, as a UTC instant.
pub fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc() - Duration::seconds(i64::from(offset.local_minus_utc()))
}

/// Whether `now` is inside `window`, evaluated in Perth time.
/// An absent or blank window is always open.
pub fn is_within_send_window(window: Option<&str>, now: DateTime<Utc>) -> bool {
    is_within_send_window_at(window, now, business_offset(PERTH_UTC_OFFSET_HOURS))
}

/// As `is_within_send_window`, for an explicit business offset.
///
/// A window that cannot be parsed is logged and treated as open.
pub fn is_within_send_window_at(window: Option<&str>, now: DateTime<Utc>, offset: FixedOffset) -> bool {
    let Some(raw) = window.map(str::trim).filter(|w| !w.is_empty()) else {
        return true;
    };
    match raw.parse::<SendWindow>() {
        Ok(w) => w.contains(now.with_timezone(&offset).time()),
        Err(e) => {
            warn!("ignoring unreadable send window: {e}");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_midnight_perth() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let t = local_midnight(d, business_offset(8));
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 6, 9, 16, 0, 0).unwrap());
    }

    /// UTC instant for a Perth wall-clock time on a fixed day.
    fn perth(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        business_offset(8)
            .with_ymd_and_hms(2024, 6, 3, h, m, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_absent_window_is_open() {
        assert!(is_within_send_window(None, perth(3, 0, 0)));
        assert!(is_within_send_window(Some("  "), perth(3, 0, 0)));
    }

    #[test]
    fn test_business_hours_inclusive() {
        let w = Some("09:00-17:00");
        assert!(!is_within_send_window(w, perth(8, 59, 59)));
        assert!(is_within_send_window(w, perth(9, 0, 0)));
        assert!(is_within_send_window(w, perth(12, 30, 0)));
        assert!(is_within_send_window(w, perth(17, 0, 0)));
        assert!(is_within_send_window(w, perth(17, 0, 59)));
        assert!(!is_within_send_window(w, perth(17, 1, 0)));
        assert!(!is_within_send_window(w, perth(23, 0, 0)));
    }

    #[test]
    fn test_evaluated_in_perth_not_utc() {
        // 01:00 UTC is 09:00 in Perth.
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 1, 0, 0).unwrap();
        assert!(is_within_send_window(Some("09:00-17:00"), now));
        // 10:00 UTC is 18:00 in Perth.
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        assert!(!is_within_send_window(Some("09:00-17:00"), now));
    }

    #[test]
    fn test_wraps_midnight() {
        let w = Some("22:00-06:00");
        assert!(is_within_send_window(w, perth(23, 15, 0)));
        assert!(is_within_send_window(w, perth(5, 0, 0)));
        assert!(!is_within_send_window(w, perth(12, 0, 0)));
    }

    #[test]
    fn test_malformed_window_is_open() {
        assert!(is_within_send_window(Some("nine to five"), perth(3, 0, 0)));
        assert!(is_within_send_window(Some("25:00-26:00"), perth(3, 0, 0)));
    }

    #[test]
    fn test_parse_and_display() {
        let w: SendWindow = " 8:30 - 17:00 ".parse().unwrap();
        assert_eq!(w.to_string(), "08:30-17:00");
        assert!("0900-1700".parse::<SendWindow>().is_err());
    }

    #[test]
    fn test_other_offset() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 23, 30, 0).unwrap();
        // 09:30 in UTC+10.
        assert!(is_within_send_window_at(Some("09:00-17:00"), now, business_offset(10)));
        assert!(!is_within_send_window_at(Some("09:00-17:00"), now, business_offset(8)));
    }
}
