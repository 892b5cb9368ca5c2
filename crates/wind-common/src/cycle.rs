//! GFS publication cycles.
//!
//! GFS runs four times a day (00Z, 06Z, 12Z, 18Z). Every timestamp belongs to
//! the cycle at or before it; stepping back walks the calendar in UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Hours between two consecutive cycles.
pub const CYCLE_STEP_HOURS: u32 = 6;

const CYCLE_STEP_SECS: i64 = CYCLE_STEP_HOURS as i64 * 3600;

/// A model cycle, always on a [`CYCLE_STEP_HOURS`] boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cycle(DateTime<Utc>);

impl Cycle {
    /// The cycle containing `t`.
    pub fn of(t: DateTime<Utc>) -> Self {
        let offset = t.timestamp().rem_euclid(CYCLE_STEP_SECS);
        let nanos = i64::from(t.timestamp_subsec_nanos());
        Cycle(t - Duration::seconds(offset) - Duration::nanoseconds(nanos))
    }

    /// Build a cycle from calendar fields. The hour is floored to the step.
    pub fn from_ymdh(year: i32, month: u32, day: u32, hour: u32) -> Option<Self> {
        let t = NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_opt(hour, 0, 0)?
            .and_utc();
        Some(Self::of(t))
    }

    /// The cycle one step earlier.
    pub fn previous(&self) -> Self {
        Cycle(self.0 - Duration::hours(i64::from(CYCLE_STEP_HOURS)))
    }

    /// The instant the cycle starts at.
    pub fn as_time(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Cycle hour (0, 6, 12 or 18).
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    /// `YYYYMMDD` date component used in GFS paths.
    pub fn date_token(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d.%H"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid cycle {0:?} (expected YYYYMMDD.HH)")]
pub struct CycleParseError(String);

impl FromStr for Cycle {
    type Err = CycleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || CycleParseError(s.to_string());
        let (date, hour) = s.split_once('.').ok_or_else(err)?;
        if date.len() != 8 || hour.len() != 2 {
            return Err(err());
        }
        let date = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| err())?;
        let hour: u32 = hour.parse().map_err(|_| err())?;
        if hour % CYCLE_STEP_HOURS != 0 {
            return Err(err());
        }
        Cycle::from_ymdh(date.year(), date.month(), date.day(), hour).ok_or_else(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_of_floors_to_step() {
        let c = Cycle::of(utc(2024, 3, 5, 17, 42, 9));
        assert_eq!(c.as_time(), utc(2024, 3, 5, 12, 0, 0));
        assert_eq!(c.hour(), 12);
        assert_eq!(c.to_string(), "20240305.12");
    }

    #[test]
    fn test_of_is_idempotent() {
        let mut t = utc(2023, 12, 30, 0, 0, 0);
        while t < utc(2024, 1, 3, 0, 0, 0) {
            let c = Cycle::of(t);
            assert_eq!(Cycle::of(c.as_time()), c);
            assert!(c.as_time() <= t);
            assert!(t - c.as_time() < Duration::hours(6));
            t += Duration::minutes(37);
        }
    }

    #[test]
    fn test_of_drops_subsecond_precision() {
        let t = utc(2024, 6, 1, 6, 0, 0) + Duration::milliseconds(999);
        assert_eq!(Cycle::of(t).as_time(), utc(2024, 6, 1, 6, 0, 0));
    }

    #[test]
    fn test_previous_rolls_over_year() {
        let c = Cycle::of(utc(2024, 1, 1, 0, 0, 0));
        assert_eq!(c.previous().as_time(), utc(2023, 12, 31, 18, 0, 0));
        assert_eq!(c.previous().to_string(), "20231231.18");
    }

    #[test]
    fn test_previous_rolls_over_leap_day() {
        let c = Cycle::from_ymdh(2024, 3, 1, 3).unwrap();
        assert_eq!(c.to_string(), "20240301.00");
        assert_eq!(c.previous().to_string(), "20240229.18");
    }

    #[test]
    fn test_previous_within_day() {
        let c = Cycle::from_ymdh(2024, 7, 14, 18).unwrap();
        assert_eq!(c.previous().to_string(), "20240714.12");
        assert_eq!(c.previous().previous().previous().to_string(), "20240714.00");
    }

    #[test]
    fn test_parse_roundtrip() {
        let c: Cycle = "20231231.18".parse().unwrap();
        assert_eq!(c.as_time(), utc(2023, 12, 31, 18, 0, 0));
        assert_eq!(c.date_token(), "20231231");
    }

    #[test]
    fn test_parse_rejects_off_step_hour() {
        assert!("20231231.07".parse::<Cycle>().is_err());
        assert!("2023123.18".parse::<Cycle>().is_err());
        assert!("20231331.00".parse::<Cycle>().is_err());
        assert!("garbage".parse::<Cycle>().is_err());
    }

    #[test]
    fn test_serde_as_timestamp() {
        let c = Cycle::from_ymdh(2024, 7, 14, 18).unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.starts_with("\"2024-07-14T18:00:00"));
        assert_eq!(serde_json::from_str::<Cycle>(&json).unwrap(), c);
    }
}
