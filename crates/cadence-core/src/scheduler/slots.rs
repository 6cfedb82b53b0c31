use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::CoreError;
use crate::models::UserCalendarPreferences;
use crate::timezone;

/// Half-open span of time `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, minutes: i64) -> Self {
        Self {
            start,
            end: timezone::end_after(start, minutes),
        }
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// The user's working window on a local date, as absolute instants.
pub fn work_window(
    date: NaiveDate,
    prefs: &UserCalendarPreferences,
    tz: &Tz,
) -> Result<Interval, CoreError> {
    let start = timezone::local_to_utc(date, prefs.work_start_time, tz)?;
    let end = timezone::local_to_utc(date, prefs.work_end_time, tz)?;
    Ok(Interval { start, end })
}

/// Earliest start inside `window` where `minutes` fit without touching `occupied`.
///
/// `occupied` must be sorted by start. Candidates are tried in order: before
/// the first interval, at the start of each sufficient gap, after the last
/// interval. A slot may end exactly at the window's end.
pub fn first_fit(window: &Interval, occupied: &[Interval], minutes: i64) -> Option<DateTime<Utc>> {
    if minutes > (window.end - window.start).num_minutes() {
        return None;
    }
    let length = Duration::minutes(minutes);
    let mut cursor = window.start;

    for interval in occupied {
        if cursor + length > window.end {
            return None;
        }
        if cursor + length <= interval.start {
            return Some(cursor);
        }
        cursor = cursor.max(interval.end);
    }

    (cursor + length <= window.end).then_some(cursor)
}
