//! Automatic placement of loose tasks into the user's working hours.
//!
//! [`SlotFinder`] buckets non-recurring tasks by local day, places each one in
//! the first free gap of its day and rolls tasks that do not fit forward to
//! later working days. It never writes; callers persist the returned tasks,
//! e.g. through [`TaskStore::update_task_starts`](crate::repository::TaskStore::update_task_starts).

use std::collections::HashSet;

use chrono::{DateTime, Days, NaiveTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{SchedulerConfig, Task};
use crate::repository::{PreferencesReader, TaskReader};
use crate::timezone;

pub mod ledger;
pub mod slots;

pub use ledger::{DayLedger, ScheduleReport};
pub use slots::Interval;

use ledger::PlacementContext;

/// Result of a scheduling run.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    /// Every input task, in input order
    pub tasks: Vec<Task>,
    pub report: ScheduleReport,
}

pub struct SlotFinder<'a, R> {
    store: &'a R,
    config: SchedulerConfig,
}

impl<'a, R> SlotFinder<'a, R>
where
    R: TaskReader + PreferencesReader,
{
    pub fn new(store: &'a R, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    /// Assigns start instants to `tasks` for `user_id`. Tasks without a start
    /// are treated as due today.
    pub async fn schedule(&self, tasks: Vec<Task>, user_id: Uuid) -> Result<Vec<Task>, CoreError> {
        self.schedule_at(tasks, user_id, Utc::now()).await
    }

    /// Like [`schedule`](Self::schedule) with an explicit clock.
    pub async fn schedule_at(
        &self,
        tasks: Vec<Task>,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, CoreError> {
        Ok(self.plan(tasks, user_id, now).await?.tasks)
    }

    /// Runs placement and reports what happened to each task.
    #[instrument(skip(self, tasks, now), fields(user_id = %user_id, tasks = tasks.len()))]
    pub async fn plan(
        &self,
        tasks: Vec<Task>,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ScheduleOutcome, CoreError> {
        let prefs = self.store.get_preferences(user_id).await?;
        prefs.validate()?;
        let tz = timezone::parse_timezone(&prefs.timezone)?;

        let today = timezone::local_date(now, &tz);
        let buckets = ledger::partition(&tasks, &tz, today);

        let (Some(&first_day), Some(&last_day)) = (buckets.keys().next(), buckets.keys().next_back())
        else {
            debug!("nothing to place");
            return Ok(ScheduleOutcome {
                tasks,
                report: ScheduleReport::default(),
            });
        };

        // One read covers every bucket plus the furthest day a bump can reach
        let horizon = last_day
            .checked_add_days(Days::new(u64::from(self.config.max_lookahead_days) + 1))
            .ok_or_else(|| CoreError::InvalidInput(format!("Date {} is out of range", last_day)))?;
        let range_start = timezone::local_to_utc(first_day, NaiveTime::MIN, &tz)?;
        let range_end = timezone::local_to_utc(horizon, NaiveTime::MIN, &tz)?;

        let scheduling: HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();
        let committed: Vec<Task> = self
            .store
            .list_tasks(user_id, range_start, range_end)
            .await?
            .into_iter()
            .filter(|t| !scheduling.contains(&t.id))
            .collect();

        debug!(
            days = buckets.len(),
            committed = committed.len(),
            %range_start,
            %range_end,
            "loaded scheduling context"
        );

        let ledger = DayLedger::from_committed(&committed, &prefs, &tz);
        let ctx = PlacementContext {
            prefs: &prefs,
            tz: &tz,
            config: &self.config,
        };
        let (tasks, report, _) = ledger::place(tasks, &buckets, &ctx, ledger)?;

        info!(
            placed = report.placed.len(),
            rescheduled = report.rescheduled.len(),
            unplaced = report.unplaced.len(),
            "scheduling run finished"
        );

        Ok(ScheduleOutcome { tasks, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecurrencePattern, TaskType, UserCalendarPreferences};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use proptest::prelude::*;
    use std::sync::Mutex;

    struct FakeStore {
        prefs: UserCalendarPreferences,
        committed: Vec<Task>,
        reads: Mutex<usize>,
    }

    impl FakeStore {
        fn new(committed: Vec<Task>) -> Self {
            Self {
                prefs: UserCalendarPreferences::defaults_for(Uuid::nil()),
                committed,
                reads: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl TaskReader for FakeStore {
        async fn list_tasks(
            &self,
            _user_id: Uuid,
            range_start: DateTime<Utc>,
            range_end: DateTime<Utc>,
        ) -> Result<Vec<Task>, CoreError> {
            *self.reads.lock().unwrap() += 1;
            Ok(self
                .committed
                .iter()
                .filter(|t| t.start_instant.is_some_and(|s| s >= range_start && s < range_end))
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl PreferencesReader for FakeStore {
        async fn get_preferences(&self, _user_id: Uuid) -> Result<UserCalendarPreferences, CoreError> {
            Ok(self.prefs.clone())
        }
    }

    // 2025-03-03 is a Monday
    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, h, m, 0).unwrap()
    }

    fn task(start: Option<DateTime<Utc>>, minutes: i64) -> Task {
        Task {
            title: "task".to_string(),
            start_instant: start,
            duration_minutes: Some(minutes),
            ..Default::default()
        }
    }

    fn starts(tasks: &[Task]) -> Vec<Option<DateTime<Utc>>> {
        tasks.iter().map(|t| t.start_instant).collect()
    }

    #[tokio::test]
    async fn test_three_tasks_fill_morning() {
        let store = FakeStore::new(vec![]);
        let finder = SlotFinder::new(&store, SchedulerConfig::default());
        let tasks = (0..3).map(|_| task(Some(at(3, 9, 0)), 60)).collect();

        let result = finder.schedule_at(tasks, Uuid::nil(), at(3, 7, 0)).await.unwrap();

        assert_eq!(
            starts(&result),
            vec![Some(at(3, 9, 0)), Some(at(3, 10, 0)), Some(at(3, 11, 0))]
        );
        assert_eq!(*store.reads.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_full_day_bumps_to_next_working_day() {
        let store = FakeStore::new(vec![task(Some(at(3, 9, 0)), 480)]);
        let finder = SlotFinder::new(&store, SchedulerConfig::default());
        let pending = task(Some(at(3, 9, 0)), 30);
        let id = pending.id;

        let outcome = finder.plan(vec![pending], Uuid::nil(), at(3, 7, 0)).await.unwrap();

        assert_eq!(outcome.tasks[0].start_instant, Some(at(4, 9, 0)));
        assert_eq!(outcome.report.rescheduled, vec![id]);
    }

    #[tokio::test]
    async fn test_weekend_task_moves_to_monday() {
        let store = FakeStore::new(vec![]);
        let finder = SlotFinder::new(&store, SchedulerConfig::default());
        // Saturday 2025-03-08
        let result = finder
            .schedule_at(vec![task(Some(at(8, 10, 0)), 30)], Uuid::nil(), at(3, 7, 0))
            .await
            .unwrap();
        assert_eq!(result[0].start_instant, Some(at(10, 9, 0)));
    }

    #[tokio::test]
    async fn test_exhausted_lookahead_leaves_task_unchanged() {
        let committed = (3..=5).map(|day| task(Some(at(day, 9, 0)), 480)).collect();
        let store = FakeStore::new(committed);
        let finder = SlotFinder::new(&store, SchedulerConfig { max_lookahead_days: 2 });
        let pending = task(Some(at(3, 12, 0)), 30);
        let id = pending.id;

        let outcome = finder.plan(vec![pending], Uuid::nil(), at(3, 7, 0)).await.unwrap();

        assert_eq!(outcome.tasks[0].start_instant, Some(at(3, 12, 0)));
        assert_eq!(outcome.report.unplaced, vec![id]);
    }

    #[tokio::test]
    async fn test_recurring_tasks_pass_through_in_order() {
        let store = FakeStore::new(vec![]);
        let finder = SlotFinder::new(&store, SchedulerConfig::default());
        let recurring = Task {
            task_type: TaskType::Recurring,
            recurrence_pattern: Some(RecurrencePattern::Weekly),
            ..task(Some(at(3, 15, 45)), 60)
        };
        let loose = task(None, 45);
        let input = vec![recurring.clone(), loose.clone()];

        let result = finder.schedule_at(input, Uuid::nil(), at(4, 12, 0)).await.unwrap();

        assert_eq!(result[0].id, recurring.id);
        assert_eq!(result[0].start_instant, recurring.start_instant);
        assert_eq!(result[1].id, loose.id);
        // Unstarted tasks are due "today"
        assert_eq!(result[1].start_instant, Some(at(4, 9, 0)));
    }

    #[tokio::test]
    async fn test_default_duration_applies_to_missing_and_zero() {
        let store = FakeStore::new(vec![]);
        let finder = SlotFinder::new(&store, SchedulerConfig::default());
        let mut zero = task(Some(at(3, 9, 0)), 0);
        zero.duration_minutes = Some(0);
        let mut missing = task(Some(at(3, 9, 0)), 0);
        missing.duration_minutes = None;

        let result = finder.schedule_at(vec![zero, missing], Uuid::nil(), at(3, 7, 0)).await.unwrap();

        assert_eq!(starts(&result), vec![Some(at(3, 9, 0)), Some(at(3, 9, 30))]);
    }

    #[tokio::test]
    async fn test_oversized_tasks_stay_unplaced() {
        let store = FakeStore::new(vec![task(Some(at(3, 9, 0)), i64::MAX)]);
        let finder = SlotFinder::new(&store, SchedulerConfig { max_lookahead_days: 3 });
        let huge = task(Some(at(4, 9, 0)), 1_000_000_000_000);
        let small = task(Some(at(3, 9, 0)), 30);
        let (huge_id, small_id) = (huge.id, small.id);

        let outcome = finder.plan(vec![huge, small], Uuid::nil(), at(3, 7, 0)).await.unwrap();

        assert_eq!(outcome.tasks[0].start_instant, Some(at(4, 9, 0)));
        assert!(outcome.report.unplaced.contains(&huge_id));
        // The committed task fills Monday, so the short one moves to Tuesday
        assert_eq!(outcome.tasks[1].start_instant, Some(at(4, 9, 0)));
        assert_eq!(outcome.report.rescheduled, vec![small_id]);
    }

    #[tokio::test]
    async fn test_input_tasks_are_not_their_own_obstacles() {
        let existing = task(Some(at(3, 9, 0)), 60);
        let store = FakeStore::new(vec![existing.clone()]);
        let finder = SlotFinder::new(&store, SchedulerConfig::default());

        let result = finder.schedule_at(vec![existing], Uuid::nil(), at(3, 7, 0)).await.unwrap();

        assert_eq!(result[0].start_instant, Some(at(3, 9, 0)));
    }

    #[tokio::test]
    async fn test_window_follows_user_timezone() {
        let mut store = FakeStore::new(vec![]);
        store.prefs.timezone = "America/New_York".to_string();
        let finder = SlotFinder::new(&store, SchedulerConfig::default());

        // 15:00 UTC is 10:00 in New York on Monday
        let result = finder
            .schedule_at(vec![task(Some(at(3, 15, 0)), 30)], Uuid::nil(), at(3, 12, 0))
            .await
            .unwrap();

        assert_eq!(result[0].start_instant, Some(at(3, 14, 0)));
    }

    #[tokio::test]
    async fn test_empty_input_skips_store() {
        let store = FakeStore::new(vec![]);
        let finder = SlotFinder::new(&store, SchedulerConfig::default());
        let result = finder.schedule(vec![], Uuid::nil()).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(*store.reads.lock().unwrap(), 0);
    }

    proptest! {
        #[test]
        fn prop_no_double_booking(
            durations in prop::collection::vec(1i64..=240, 1..16),
            busy_hours in prop::collection::vec(9u32..17, 0..4),
        ) {
            let committed: Vec<Task> = busy_hours.iter().map(|h| task(Some(at(3, *h, 0)), 45)).collect();
            let store = FakeStore::new(committed.clone());
            let finder = SlotFinder::new(&store, SchedulerConfig::default());
            let input: Vec<Task> = durations.iter().map(|d| task(Some(at(3, 9, 0)), *d)).collect();

            let outcome = tokio_test::block_on(finder.plan(input.clone(), Uuid::nil(), at(3, 7, 0)))
                .unwrap();

            prop_assert_eq!(outcome.tasks.len(), input.len());
            let unplaced: HashSet<Uuid> = outcome.report.unplaced.iter().copied().collect();
            let mut intervals: Vec<Interval> = outcome
                .tasks
                .iter()
                .filter(|t| !unplaced.contains(&t.id))
                .map(|t| Interval::new(t.start_instant.unwrap(), t.duration_minutes.unwrap()))
                .collect();

            for placed in &intervals {
                let date = placed.start.date_naive();
                prop_assert!(placed.start >= Utc.from_utc_datetime(&date.and_hms_opt(9, 0, 0).unwrap()));
                prop_assert!(placed.end <= Utc.from_utc_datetime(&date.and_hms_opt(17, 0, 0).unwrap()));
                for busy in &committed {
                    let busy = Interval::new(busy.start_instant.unwrap(), 45);
                    prop_assert!(!placed.overlaps(&busy));
                }
            }

            intervals.sort();
            for pair in intervals.windows(2) {
                prop_assert!(!pair[0].overlaps(&pair[1]));
            }
            prop_assert!(outcome.tasks.iter().all(|t| t.start_instant.unwrap().date_naive() >= NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()));
        }
    }
}
