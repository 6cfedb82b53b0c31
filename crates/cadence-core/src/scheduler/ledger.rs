use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};
use uuid::Uuid;

use super::slots::{first_fit, work_window, Interval};
use crate::error::CoreError;
use crate::models::{SchedulerConfig, Task, UserCalendarPreferences};
use crate::timezone;

/// Occupied intervals per local date, committed plus placed during the run.
#[derive(Debug, Clone, Default)]
pub struct DayLedger {
    days: BTreeMap<NaiveDate, Vec<Interval>>,
}

impl DayLedger {
    /// Seeds the ledger with tasks already on the calendar.
    pub fn from_committed(committed: &[Task], prefs: &UserCalendarPreferences, tz: &Tz) -> Self {
        let mut ledger = Self::default();
        for task in committed {
            if let Some(start) = task.start_instant {
                let date = timezone::local_date(start, tz);
                ledger.reserve(date, Interval::new(start, prefs.duration_for(task)));
            }
        }
        ledger
    }

    /// Intervals on `date`, sorted by start.
    pub fn occupied(&self, date: NaiveDate) -> &[Interval] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn reserve(&mut self, date: NaiveDate, interval: Interval) {
        let day = self.days.entry(date).or_default();
        let at = day.partition_point(|existing| existing <= &interval);
        day.insert(at, interval);
    }
}

/// Ids of tasks by how a run treated them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Placed on their own local day
    pub placed: Vec<Uuid>,
    /// Moved to a later working day
    pub rescheduled: Vec<Uuid>,
    /// No slot within the lookahead; returned unchanged
    pub unplaced: Vec<Uuid>,
}

/// Non-recurring task indices grouped by local date.
///
/// Tasks without a start fall on `today`. Within a day tasks keep the order of
/// their original instant, unstarted ones last, ties by input position.
pub fn partition(tasks: &[Task], tz: &Tz, today: NaiveDate) -> BTreeMap<NaiveDate, Vec<usize>> {
    let mut buckets: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (index, task) in tasks.iter().enumerate().filter(|(_, t)| !t.is_recurring()) {
        let date = task
            .start_instant
            .map_or(today, |start| timezone::local_date(start, tz));
        buckets.entry(date).or_default().push(index);
    }

    for indices in buckets.values_mut() {
        indices.sort_by_key(|&i| (tasks[i].start_instant.is_none(), tasks[i].start_instant, i));
    }
    buckets
}

/// Everything a placement pass reads; nothing here changes during the pass.
pub struct PlacementContext<'a> {
    pub prefs: &'a UserCalendarPreferences,
    pub tz: &'a Tz,
    pub config: &'a SchedulerConfig,
}

impl PlacementContext<'_> {
    fn is_working_day(&self, date: NaiveDate) -> bool {
        self.prefs.is_working_day(timezone::iso_weekday(date))
    }

    fn try_day(
        &self,
        ledger: &DayLedger,
        date: NaiveDate,
        minutes: i64,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        let window = work_window(date, self.prefs, self.tz)?;
        Ok(first_fit(&window, ledger.occupied(date), minutes))
    }
}

/// Places every bucketed task, same-day first and then through the bump queue.
///
/// Takes the ledger by value and hands back the final one with the updated
/// tasks, so the whole pass is a function of its inputs.
pub fn place(
    mut tasks: Vec<Task>,
    buckets: &BTreeMap<NaiveDate, Vec<usize>>,
    ctx: &PlacementContext<'_>,
    mut ledger: DayLedger,
) -> Result<(Vec<Task>, ScheduleReport, DayLedger), CoreError> {
    let mut report = ScheduleReport::default();
    let mut bump_queue: Vec<(usize, NaiveDate)> = Vec::new();

    for (&date, indices) in buckets {
        if !ctx.is_working_day(date) {
            debug!(%date, count = indices.len(), "non-working day, queued for bump");
            bump_queue.extend(indices.iter().map(|&i| (i, date)));
            continue;
        }

        for &index in indices {
            let minutes = ctx.prefs.duration_for(&tasks[index]);
            match ctx.try_day(&ledger, date, minutes)? {
                Some(start) => {
                    ledger.reserve(date, Interval::new(start, minutes));
                    tasks[index].start_instant = Some(start);
                    report.placed.push(tasks[index].id);
                }
                None => bump_queue.push((index, date)),
            }
        }
    }

    for (index, anchor) in bump_queue {
        let minutes = ctx.prefs.duration_for(&tasks[index]);
        let mut slot = None;

        for offset in 1..=u64::from(ctx.config.max_lookahead_days) {
            let Some(date) = anchor.checked_add_days(Days::new(offset)) else {
                break;
            };
            if !ctx.is_working_day(date) {
                continue;
            }
            if let Some(start) = ctx.try_day(&ledger, date, minutes)? {
                slot = Some((date, start));
                break;
            }
        }

        let task = &mut tasks[index];
        match slot {
            Some((date, start)) => {
                debug!(task_id = %task.id, %anchor, %date, "task bumped to later day");
                ledger.reserve(date, Interval::new(start, minutes));
                task.start_instant = Some(start);
                report.rescheduled.push(task.id);
            }
            None => {
                warn!(
                    task_id = %task.id,
                    %anchor,
                    lookahead_days = ctx.config.max_lookahead_days,
                    "no free slot found, task left unscheduled"
                );
                report.unplaced.push(task.id);
            }
        }
    }

    Ok((tasks, report, ledger))
}
