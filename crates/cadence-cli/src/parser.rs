use anyhow::{anyhow, Result};
use cadence_core::timezone::local_to_utc;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parses an absolute or human date-time ("tomorrow 9am") in the user's zone.
pub fn parse_datetime(input: &str, tz: &Tz, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(local_to_utc(naive.date(), naive.time(), tz)?);
        }
    }

    parse_date_string(input, now.with_timezone(tz), Dialect::Uk)
        .map(|local| local.with_timezone(&Utc))
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

/// Parses a calendar date ("2025-03-10", "next monday") in the user's zone.
pub fn parse_date(input: &str, tz: &Tz, now: DateTime<Utc>) -> Result<NaiveDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }

    parse_date_string(input, now.with_timezone(tz), Dialect::Uk)
        .map(|local| local.date_naive())
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

/// Parses a wall-clock time such as `09:00` or `17:30`.
pub fn parse_time(input: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M")
        .map_err(|_| anyhow!("Invalid time '{}': expected HH:MM", input))
}

/// Parses working days given as ISO numbers (`1,2,3`) or names (`mon,tue`).
pub fn parse_working_days(input: &str) -> Result<Vec<u32>> {
    let mut days = input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|day| -> Result<u32> {
            let number = match day.to_lowercase().as_str() {
                "mon" | "monday" => 1,
                "tue" | "tuesday" => 2,
                "wed" | "wednesday" => 3,
                "thu" | "thursday" => 4,
                "fri" | "friday" => 5,
                "sat" | "saturday" => 6,
                "sun" | "sunday" => 7,
                other => other
                    .parse::<u32>()
                    .map_err(|_| anyhow!("Unknown weekday '{}'", day))?,
            };
            Ok(number)
        })
        .collect::<Result<Vec<_>>>()?;

    if days.is_empty() {
        return Err(anyhow!("At least one working day is required"));
    }
    days.sort_unstable();
    days.dedup();
    Ok(days)
}
