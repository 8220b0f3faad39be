//! Decoding of CF convention time coordinates.
//!
//! Time coordinates are stored in files as offsets from a reference date, eg "days since
//! 1950-01-01". To compare datasets that use different reference dates or units, every time
//! coordinate is decoded to seconds since 1970-01-01 00:00:00, counted in the coordinate's own
//! calendar.
//!
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::errors::{Error, Result};

/// The units attribute written for decoded time coordinates
pub const EPOCH_UNITS: &str = "seconds since 1970-01-01 00:00:00";

const SECONDS_PER_DAY: f64 = 86_400.0;

const CUMULATIVE_DAYS: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
const CUMULATIVE_DAYS_LEAP: [i64; 12] = [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335];
const MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Calendar {
    #[default]
    Standard,
    NoLeap,
    AllLeap,
    Day360,
}

impl FromStr for Calendar {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" | "proleptic_gregorian" => Ok(Self::Standard),
            "noleap" | "365_day" => Ok(Self::NoLeap),
            "all_leap" | "366_day" => Ok(Self::AllLeap),
            "360_day" => Ok(Self::Day360),
            other => Err(Error::Time(format!("unsupported calendar '{other}'"))),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Standard => "standard",
            Self::NoLeap => "noleap",
            Self::AllLeap => "all_leap",
            Self::Day360 => "360_day",
        };
        write!(f, "{name}")
    }
}

impl Calendar {
    /// Number of days between 1970-01-01 and the given date in this calendar.
    ///
    pub fn days_from_epoch(&self, year: i32, month: u32, day: u32) -> Result<i64> {
        let bad_date = || Error::Time(format!("{year:04}-{month:02}-{day:02} in {self} calendar"));
        if !(1..=12).contains(&month) || day == 0 {
            return Err(bad_date());
        }
        let m = (month - 1) as usize;
        let years = i64::from(year) - 1970;
        let day = i64::from(day);

        match self {
            Self::Standard => {
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or_else(bad_date)?;
                let date = NaiveDate::from_ymd_opt(year, month, day as u32).ok_or_else(bad_date)?;
                Ok((date - epoch).num_days())
            }
            Self::NoLeap => {
                if day > i64::from(MONTH_DAYS[m]) {
                    return Err(bad_date());
                }
                Ok(years * 365 + CUMULATIVE_DAYS[m] + day - 1)
            }
            Self::AllLeap => {
                let length = if m == 1 { 29 } else { MONTH_DAYS[m] };
                if day > i64::from(length) {
                    return Err(bad_date());
                }
                Ok(years * 366 + CUMULATIVE_DAYS_LEAP[m] + day - 1)
            }
            Self::Day360 => {
                if day > 30 {
                    return Err(bad_date());
                }
                Ok(years * 360 + (m as i64) * 30 + day - 1)
            }
        }
    }

    /// Parse a date or date-time string and return seconds since 1970-01-01 in this calendar.
    ///
    /// Accepts "YYYY-MM-DD", "YYYY-MM-DD HH:MM:SS" and "YYYY-MM-DDTHH:MM:SS", with optional
    /// fractional seconds and a trailing "Z" or "UTC".
    ///
    pub fn parse_datetime(&self, text: &str) -> Result<f64> {
        let bad = || Error::Time(format!("can't parse date '{text}'"));
        let text = text.trim();
        let text = text
            .strip_suffix("UTC")
            .or_else(|| text.strip_suffix('Z'))
            .unwrap_or(text)
            .trim_end();

        let (date, clock) = match text.split_once(|c: char| c == 'T' || c == ' ') {
            Some((date, clock)) => (date, clock.trim()),
            None => (text, ""),
        };

        let mut parts = date.splitn(3, '-');
        let year: i32 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
        let month: u32 = parts.next().unwrap_or("1").parse().map_err(|_| bad())?;
        let day: u32 = parts.next().unwrap_or("1").parse().map_err(|_| bad())?;
        let days = self.days_from_epoch(year, month, day)?;

        let mut seconds = 0.0;
        if !clock.is_empty() {
            let clock = clock.strip_suffix("+00:00").unwrap_or(clock);
            for (part, scale) in clock.split(':').zip([3600.0, 60.0, 1.0]) {
                let value: f64 = part.parse().map_err(|_| bad())?;
                seconds += value * scale;
            }
        }

        Ok(days as f64 * SECONDS_PER_DAY + seconds)
    }
}

/// Parsed CF time units, eg "hours since 2000-01-01 00:00:00"
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeUnits {
    /// Length of one unit, in seconds
    pub scale: f64,

    /// The reference date, in seconds since 1970-01-01 in `calendar`
    pub epoch: f64,

    pub calendar: Calendar,
}

impl TimeUnits {
    /// Parse a CF units string. Returns `Ok(None)` when `units` doesn't describe time at all.
    ///
    pub fn parse(units: &str, calendar: Calendar) -> Result<Option<Self>> {
        let Some((unit, since)) = units.split_once(" since ") else {
            return Ok(None);
        };

        let scale = match unit.trim().to_ascii_lowercase().as_str() {
            "microseconds" | "microsecond" | "us" => 1e-6,
            "milliseconds" | "millisecond" | "ms" => 1e-3,
            "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
            "minutes" | "minute" | "mins" | "min" => 60.0,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3600.0,
            "days" | "day" | "d" => SECONDS_PER_DAY,
            "weeks" | "week" => 7.0 * SECONDS_PER_DAY,
            other => {
                return Err(Error::Time(format!(
                    "unsupported time unit '{other}' in '{units}'"
                )))
            }
        };
        let epoch = calendar.parse_datetime(since)?;

        Ok(Some(Self {
            scale,
            epoch,
            calendar,
        }))
    }

    /// Convert an encoded offset to seconds since 1970-01-01
    ///
    pub fn decode(&self, value: f64) -> f64 {
        self.epoch + value * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_from_epoch() -> Result<()> {
        assert_eq!(Calendar::Standard.days_from_epoch(1970, 1, 1)?, 0);
        assert_eq!(Calendar::Standard.days_from_epoch(2000, 3, 1)?, 11017);
        assert_eq!(Calendar::NoLeap.days_from_epoch(1971, 1, 1)?, 365);
        assert_eq!(Calendar::NoLeap.days_from_epoch(1972, 3, 1)?, 365 * 2 + 59);
        assert_eq!(Calendar::AllLeap.days_from_epoch(1971, 3, 1)?, 366 + 60);
        assert_eq!(Calendar::Day360.days_from_epoch(1971, 2, 30)?, 360 + 59);

        assert!(Calendar::Standard.days_from_epoch(2001, 2, 29).is_err());
        assert!(Calendar::NoLeap.days_from_epoch(2000, 2, 29).is_err());
        assert!(Calendar::Day360.days_from_epoch(2000, 1, 31).is_err());

        Ok(())
    }

    #[test]
    fn test_parse_datetime() -> Result<()> {
        let calendar = Calendar::Standard;
        assert_eq!(calendar.parse_datetime("1970-01-02")?, 86400.0);
        assert_eq!(calendar.parse_datetime("1970-01-01 01:30:00")?, 5400.0);
        assert_eq!(calendar.parse_datetime("1970-01-01T00:00:10Z")?, 10.0);
        assert_eq!(calendar.parse_datetime("1970-1-1 0:0:0.5")?, 0.5);
        assert!(calendar.parse_datetime("yesterday").is_err());

        Ok(())
    }

    #[test]
    fn test_units() -> Result<()> {
        let units = TimeUnits::parse("days since 1970-01-11", Calendar::Standard)?.unwrap();
        assert_eq!(units.decode(0.0), 10.0 * 86400.0);
        assert_eq!(units.decode(1.5), 11.5 * 86400.0);

        let units = TimeUnits::parse("hours since 1970-01-01 00:00:00", Calendar::NoLeap)?;
        assert_eq!(units.unwrap().decode(2.0), 7200.0);

        assert_eq!(TimeUnits::parse("K", Calendar::Standard)?, None);
        assert!(TimeUnits::parse("months since 2000-01-01", Calendar::Standard).is_err());

        Ok(())
    }

    #[test]
    fn test_calendar_names() -> Result<()> {
        assert_eq!("proleptic_gregorian".parse::<Calendar>()?, Calendar::Standard);
        assert_eq!("365_day".parse::<Calendar>()?, Calendar::NoLeap);
        assert_eq!("360_day".parse::<Calendar>()?, Calendar::Day360);
        assert!("julian".parse::<Calendar>().is_err());

        Ok(())
    }
}
