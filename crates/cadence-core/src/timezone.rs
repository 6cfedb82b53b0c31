use crate::error::CoreError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Validate IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<(), CoreError> {
    parse_timezone(timezone).map(|_| ())
}

pub fn parse_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone).map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// Calendar date of `instant` as seen in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Wall-clock time of `instant` as seen in `tz`.
pub fn local_time(instant: DateTime<Utc>, tz: &Tz) -> NaiveTime {
    instant.with_timezone(tz).time()
}

/// ISO weekday number, Monday = 1 .. Sunday = 7.
pub fn iso_weekday(date: NaiveDate) -> u32 {
    date.weekday().number_from_monday()
}

/// Resolve a local date and wall-clock time to an absolute instant.
///
/// Ambiguous times (fall back) resolve to the earlier instant. Times that do
/// not exist (spring forward) move one hour later.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, tz: &Tz) -> Result<DateTime<Utc>, CoreError> {
    let naive = date.and_time(time);
    if let Some(local_dt) = tz.from_local_datetime(&naive).earliest() {
        return Ok(local_dt.with_timezone(&Utc));
    }

    let shifted = naive + Duration::hours(1);
    tz.from_local_datetime(&shifted)
        .earliest()
        .map(|local_dt| local_dt.with_timezone(&Utc))
        .ok_or_else(|| {
            CoreError::InvalidInput(format!("Local time {} does not exist in {}", naive, tz.name()))
        })
}

/// `start` plus `minutes`, clamped to the latest representable instant.
pub fn end_after(start: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    Duration::try_minutes(minutes)
        .and_then(|length| start.checked_add_signed(length))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
