//! Timestamp reassembly for feeds that split "as of" into date and hour strings.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::error::LoadError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const HOUR_FORMAT: &str = "%H:%M:%S";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_date(value: &str) -> Result<NaiveDate, LoadError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| LoadError::TimeParse {
        value: value.to_string(),
        expected: "YYYY-MM-DD",
    })
}

pub fn parse_hour(value: &str) -> Result<NaiveTime, LoadError> {
    NaiveTime::parse_from_str(value.trim(), HOUR_FORMAT).map_err(|_| LoadError::TimeParse {
        value: value.to_string(),
        expected: "HH:MM:SS",
    })
}

/// Combines a `YYYY-MM-DD` date and a `HH:MM:SS` hour into one instant in `tz`.
///
/// The two strings are parsed independently, then the hour's time-of-day is
/// placed on the date's calendar day.
///
/// # Errors
///
/// Returns [`LoadError::TimeParse`] if either string does not match its
/// format.
pub fn combine_date_hour(date: &str, hour: &str, tz: Tz) -> Result<DateTime<Tz>, LoadError> {
    let day = parse_date(date)?;
    let time = parse_hour(hour)?;
    localize(day.and_time(time), tz).ok_or_else(|| LoadError::TimeParse {
        value: format!("{date} {hour}"),
        expected: "a local time that exists in the feed timezone",
    })
}

/// Parses a single `YYYY-MM-DD HH:MM:SS` field in `tz`.
pub fn parse_datetime(value: &str, tz: Tz) -> Result<DateTime<Tz>, LoadError> {
    let naive =
        NaiveDateTime::parse_from_str(value.trim(), DATETIME_FORMAT).map_err(|_| {
            LoadError::TimeParse {
                value: value.to_string(),
                expected: "YYYY-MM-DD HH:MM:SS",
            }
        })?;
    localize(naive, tz).ok_or_else(|| LoadError::TimeParse {
        value: value.to_string(),
        expected: "a local time that exists in the feed timezone",
    })
}

/// Resolves a wall-clock time in `tz`.
///
/// Ambiguous times (autumn fall-back) resolve to the earlier instant; times
/// inside a spring-forward gap are moved forward by one hour.
fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}
