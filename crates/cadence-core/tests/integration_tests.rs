use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use cadence_core::calendar::{
    CalendarError, CalendarProvider, DeleteEventRequest, LocalCalendarProvider,
    ScheduleEventRequest, ScheduledEvent, UpdateEventRequest,
};
use cadence_core::db::establish_connection;
use cadence_core::error::CoreError;
use cadence_core::models::*;
use cadence_core::recurrence::RRuleBuilder;
use cadence_core::repository::{
    CalendarEventStore, InstanceStore, PreferencesReader, PreferencesStore, SqliteRepository,
    TaskReader, TaskStore,
};
use cadence_core::scheduler::SlotFinder;
use cadence_core::series::SeriesManager;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

/// Local provider that can be told to fail every update.
struct FlakyCalendar {
    inner: LocalCalendarProvider,
    fail_updates: AtomicBool,
}

impl FlakyCalendar {
    fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CalendarProvider for FlakyCalendar {
    async fn schedule_task(
        &self,
        user_id: Uuid,
        request: ScheduleEventRequest,
    ) -> Result<ScheduledEvent, CalendarError> {
        self.inner.schedule_task(user_id, request).await
    }

    async fn update_event(&self, user_id: Uuid, request: UpdateEventRequest) -> Result<(), CalendarError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(CalendarError::Unavailable("provider offline".to_string()));
        }
        self.inner.update_event(user_id, request).await
    }

    async fn delete_event(&self, user_id: Uuid, request: DeleteEventRequest) -> Result<(), CalendarError> {
        self.inner.delete_event(user_id, request).await
    }
}

struct TestEnv {
    repo: SqliteRepository,
    calendar: FlakyCalendar,
    rules: RRuleBuilder,
    user_id: Uuid,
    _temp_dir: TempDir,
}

impl TestEnv {
    fn manager(&self) -> SeriesManager<'_, SqliteRepository, FlakyCalendar, RRuleBuilder> {
        SeriesManager::new(&self.repo, &self.calendar, &self.rules)
    }

    fn local(&self) -> &LocalCalendarProvider {
        &self.calendar.inner
    }
}

/// Helper function to create a test database
async fn setup_test_env() -> TestEnv {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    TestEnv {
        repo: SqliteRepository::new(pool.clone()),
        calendar: FlakyCalendar {
            inner: LocalCalendarProvider::new(pool),
            fail_updates: AtomicBool::new(false),
        },
        rules: RRuleBuilder::new(),
        user_id: Uuid::now_v7(),
        _temp_dir: temp_dir,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// 2025-03-03 is a Monday
fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, h, m, 0).unwrap()
}

/// Helper function to create and publish a recurring series
async fn create_series(
    env: &TestEnv,
    pattern: RecurrencePattern,
    until: Option<NaiveDate>,
) -> Task {
    let task = env
        .repo
        .add_task(NewTaskData {
            user_id: env.user_id,
            title: "Team sync".to_string(),
            start_instant: Some(at(3, 9, 0)),
            duration_minutes: Some(30),
            recurrence_pattern: Some(pattern),
            recurrence_ends: until,
            ..Default::default()
        })
        .await
        .expect("Failed to create series");

    env.manager()
        .publish(task.id)
        .await
        .expect("Failed to publish series");
    task
}

async fn occurrence_dates(env: &TestEnv, task_id: Uuid) -> Vec<NaiveDate> {
    env.manager()
        .occurrences(task_id, date(2025, 1, 1), 500)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.date)
        .collect()
}

#[tokio::test]
async fn test_preferences_default_and_round_trip() {
    let env = setup_test_env().await;

    let defaults = env.repo.get_preferences(env.user_id).await.unwrap();
    assert_eq!(defaults, UserCalendarPreferences::defaults_for(env.user_id));

    let prefs = UserCalendarPreferences {
        timezone: "Europe/Berlin".to_string(),
        working_days: vec![5, 1, 2, 2],
        work_start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        ..defaults
    };
    env.repo.save_preferences(&prefs).await.unwrap();

    let stored = env.repo.get_preferences(env.user_id).await.unwrap();
    assert_eq!(stored.timezone, "Europe/Berlin");
    assert_eq!(stored.working_days, vec![1, 2, 5]);
    assert_eq!(stored.work_start_time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());

    let invalid = UserCalendarPreferences {
        timezone: "Nowhere/City".to_string(),
        ..stored
    };
    assert!(matches!(
        env.repo.save_preferences(&invalid).await,
        Err(CoreError::InvalidTimezone(_))
    ));
}

#[tokio::test]
async fn test_list_tasks_is_half_open_and_pending_only() {
    let env = setup_test_env().await;
    for (hour, status) in [(9, TaskStatus::Pending), (10, TaskStatus::Completed), (12, TaskStatus::Pending)] {
        let mut task = NewTaskData {
            user_id: env.user_id,
            title: format!("at {}", hour),
            start_instant: Some(at(3, hour, 0)),
            ..Default::default()
        }
        .into_task();
        task.status = status;
        env.repo.insert_task(&task).await.unwrap();
    }

    let listed = env.repo.list_tasks(env.user_id, at(3, 9, 0), at(3, 12, 0)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "at 9");
}

#[tokio::test]
async fn test_schedule_and_persist_against_store() {
    let env = setup_test_env().await;

    // Committed meeting 09:00-10:00
    env.repo
        .add_task(NewTaskData {
            user_id: env.user_id,
            title: "Meeting".to_string(),
            start_instant: Some(at(3, 9, 0)),
            duration_minutes: Some(60),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut loose = Vec::new();
    for title in ["Draft", "Review", "Send"] {
        loose.push(
            NewTaskData {
                user_id: env.user_id,
                title: title.to_string(),
                start_instant: Some(at(3, 9, 0)),
                duration_minutes: Some(60),
                ..Default::default()
            }
            .into_task(),
        );
    }
    for task in &loose {
        env.repo.insert_task(task).await.unwrap();
    }

    let finder = SlotFinder::new(&env.repo, SchedulerConfig::default());
    let scheduled = finder.schedule_at(loose, env.user_id, at(3, 7, 0)).await.unwrap();
    let starts: Vec<_> = scheduled.iter().map(|t| t.start_instant).collect();
    assert_eq!(starts, vec![Some(at(3, 10, 0)), Some(at(3, 11, 0)), Some(at(3, 12, 0))]);

    assert_eq!(env.repo.update_task_starts(&scheduled).await.unwrap(), 3);
    let stored = env.repo.find_task_by_id(scheduled[2].id).await.unwrap().unwrap();
    assert_eq!(stored.start_instant, Some(at(3, 12, 0)));
}

#[tokio::test]
async fn test_publish_creates_master_once() {
    let env = setup_test_env().await;
    let task = create_series(&env, RecurrencePattern::Weekly, Some(date(2025, 6, 30))).await;

    let master = env.repo.find_master_event(task.id).await.unwrap().unwrap();
    assert!(master.is_master_event);
    assert_eq!(master.sync_status, SyncStatus::Synced);

    let again = env.manager().publish(task.id).await.unwrap();
    assert_eq!(again.id, master.id);

    let event = env.local().find_event(&master.calendar_event_id).await.unwrap().unwrap();
    assert_eq!(event.recurrence_rule.as_deref(), Some("FREQ=WEEKLY;UNTIL=20250630T235959Z"));
    assert_eq!(event.start_time, at(3, 9, 0));
}

#[tokio::test]
async fn test_future_delete_truncates_without_new_series() {
    let env = setup_test_env().await;
    let task = create_series(&env, RecurrencePattern::Weekly, None).await;
    let manager = env.manager();

    // A later occurrence already carries an exception
    manager
        .edit(EditRequest {
            task_id: task.id,
            scope: UpdateScope::Single,
            instance_date: Some(date(2025, 3, 17)),
            updates: TaskUpdates {
                title: Some("Retro".to_string()),
                ..Default::default()
            },
            reset_exceptions: false,
        })
        .await
        .unwrap();

    let summary = manager
        .delete(DeleteRequest {
            task_id: task.id,
            scope: UpdateScope::Future,
            instance_date: Some(date(2025, 3, 10)),
        })
        .await
        .unwrap();

    assert!(summary.is_fully_synced());
    assert_eq!(summary.new_task_id, None);
    assert_eq!(summary.affected, 2);

    let stored = env.repo.find_task_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(stored.recurrence_ends, Some(date(2025, 3, 9)));

    let instance = env.repo.find_instance(task.id, date(2025, 3, 17)).await.unwrap().unwrap();
    assert_eq!(instance.status, InstanceStatus::Cancelled);

    let link = env.repo.find_occurrence_event(task.id, date(2025, 3, 17)).await.unwrap().unwrap();
    assert_eq!(link.exception_type, Some(ExceptionType::Cancelled));
    assert_eq!(link.sync_status, SyncStatus::Deleted);

    let master = env.repo.find_master_event(task.id).await.unwrap().unwrap();
    let event = env.local().find_event(&master.calendar_event_id).await.unwrap().unwrap();
    assert_eq!(event.recurrence_rule.as_deref(), Some("FREQ=WEEKLY;UNTIL=20250309T235959Z"));

    assert_eq!(occurrence_dates(&env, task.id).await, vec![date(2025, 3, 3)]);
    assert_eq!(env.repo.find_tasks_for_user(env.user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_future_edit_preserves_coverage() {
    let env = setup_test_env().await;
    let task = create_series(&env, RecurrencePattern::Daily, Some(date(2025, 3, 14))).await;
    let manager = env.manager();
    let before = occurrence_dates(&env, task.id).await;
    assert_eq!(before.len(), 12);

    let summary = manager
        .edit(EditRequest {
            task_id: task.id,
            scope: UpdateScope::Future,
            instance_date: Some(date(2025, 3, 7)),
            updates: TaskUpdates {
                title: Some("Team sync v2".to_string()),
                ..Default::default()
            },
            reset_exceptions: false,
        })
        .await
        .unwrap();

    let head_id = summary.new_task_id.expect("future edit creates a new series");
    assert_eq!(summary.affected, 2);
    assert!(summary.is_fully_synced());

    let head = env.repo.find_task_by_id(head_id).await.unwrap().unwrap();
    assert_eq!(head.title, "Team sync v2");
    assert_eq!(head.start_instant, Some(at(7, 9, 0)));
    assert_eq!(head.recurrence_ends, Some(date(2025, 3, 14)));
    assert!(env.repo.find_master_event(head_id).await.unwrap().is_some());

    let mut after = occurrence_dates(&env, task.id).await;
    assert_eq!(after.last(), Some(&date(2025, 3, 6)));
    after.extend(occurrence_dates(&env, head_id).await);
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_future_edit_rejects_start_off_the_split_date() {
    let env = setup_test_env().await;
    let task = create_series(&env, RecurrencePattern::Weekly, Some(date(2025, 3, 31))).await;
    let before = occurrence_dates(&env, task.id).await;

    let result = env
        .manager()
        .edit(EditRequest {
            task_id: task.id,
            scope: UpdateScope::Future,
            instance_date: Some(date(2025, 3, 10)),
            updates: TaskUpdates {
                start_instant: Some(at(12, 9, 0)),
                ..Default::default()
            },
            reset_exceptions: false,
        })
        .await;
    assert!(matches!(result, Err(CoreError::InvalidInput(_))));

    // Nothing was truncated and no second series exists
    assert_eq!(occurrence_dates(&env, task.id).await, before);
    assert_eq!(env.repo.find_tasks_for_user(env.user_id).await.unwrap().len(), 1);

    // A new time of day on the split date keeps full coverage
    let summary = env
        .manager()
        .edit(EditRequest {
            task_id: task.id,
            scope: UpdateScope::Future,
            instance_date: Some(date(2025, 3, 10)),
            updates: TaskUpdates {
                start_instant: Some(at(10, 14, 0)),
                ..Default::default()
            },
            reset_exceptions: false,
        })
        .await
        .unwrap();
    let head_id = summary.new_task_id.unwrap();
    let mut after = occurrence_dates(&env, task.id).await;
    after.extend(occurrence_dates(&env, head_id).await);
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_single_edit_is_isolated() {
    let env = setup_test_env().await;
    let task = create_series(&env, RecurrencePattern::Weekly, Some(date(2025, 3, 31))).await;

    let summary = env
        .manager()
        .edit(EditRequest {
            task_id: task.id,
            scope: UpdateScope::Single,
            instance_date: Some(date(2025, 3, 10)),
            updates: TaskUpdates {
                title: Some("Moved sync".to_string()),
                start_instant: Some(at(10, 14, 0)),
                ..Default::default()
            },
            reset_exceptions: false,
        })
        .await
        .unwrap();
    assert_eq!(summary.affected, 1);

    let occurrences = env.manager().occurrences(task.id, date(2025, 3, 1), 10).await.unwrap();
    assert_eq!(occurrences.len(), 5);
    for occurrence in &occurrences {
        if occurrence.date == date(2025, 3, 10) {
            assert_eq!(occurrence.title, "Moved sync");
            assert_eq!(occurrence.start, at(10, 14, 0));
            assert!(occurrence.is_exception);
        } else {
            assert_eq!(occurrence.title, "Team sync");
            assert!(!occurrence.is_exception);
        }
    }

    let stored = env.repo.find_task_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Team sync");
    assert_eq!(stored.recurrence_ends, Some(date(2025, 3, 31)));

    let link = env.repo.find_occurrence_event(task.id, date(2025, 3, 10)).await.unwrap().unwrap();
    assert!(link.is_exception);
    assert_eq!(link.exception_type, Some(ExceptionType::Modified));
    assert_eq!(link.series_update_scope, Some(UpdateScope::Single));

    let overrides = env.local().find_overrides(&link.calendar_event_id).await.unwrap();
    assert_eq!(overrides.len(), 1);
    assert_eq!(overrides[0].summary.as_deref(), Some("Moved sync"));
    assert!(!overrides[0].cancelled);
}

#[tokio::test]
async fn test_single_delete_cancels_one_occurrence() {
    let env = setup_test_env().await;
    let task = create_series(&env, RecurrencePattern::Weekly, Some(date(2025, 3, 31))).await;

    env.manager()
        .delete(DeleteRequest {
            task_id: task.id,
            scope: UpdateScope::Single,
            instance_date: Some(date(2025, 3, 17)),
        })
        .await
        .unwrap();

    let occurrences = env.manager().occurrences(task.id, date(2025, 3, 1), 10).await.unwrap();
    let cancelled: Vec<_> = occurrences
        .iter()
        .filter(|o| o.status == InstanceStatus::Cancelled)
        .map(|o| o.date)
        .collect();
    assert_eq!(cancelled, vec![date(2025, 3, 17)]);

    let master = env.repo.find_master_event(task.id).await.unwrap().unwrap();
    let overrides = env.local().find_overrides(&master.calendar_event_id).await.unwrap();
    assert!(overrides[0].cancelled);
}

#[tokio::test]
async fn test_provider_failure_keeps_relational_change() {
    let env = setup_test_env().await;
    let task = create_series(&env, RecurrencePattern::Weekly, None).await;
    env.calendar.fail_updates();

    let summary = env
        .manager()
        .edit(EditRequest {
            task_id: task.id,
            scope: UpdateScope::Single,
            instance_date: Some(date(2025, 3, 10)),
            updates: TaskUpdates {
                duration_minutes: Some(90),
                ..Default::default()
            },
            reset_exceptions: false,
        })
        .await
        .expect("provider failures are not fatal");

    assert!(!summary.is_fully_synced());
    assert_eq!(summary.sync_failures[0].step, SyncStep::UpdateEvent);

    let instance = env.repo.find_instance(task.id, date(2025, 3, 10)).await.unwrap().unwrap();
    assert_eq!(instance.override_data.unwrap().duration_minutes, Some(90));

    let failed = env.repo.find_failed_events(env.user_id).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].recurrence_instance_date, Some(date(2025, 3, 10)));
}

#[tokio::test]
async fn test_edit_all_resets_exceptions() {
    let env = setup_test_env().await;
    let task = create_series(&env, RecurrencePattern::Daily, Some(date(2025, 3, 9))).await;
    let manager = env.manager();

    manager
        .delete(DeleteRequest {
            task_id: task.id,
            scope: UpdateScope::Single,
            instance_date: Some(date(2025, 3, 5)),
        })
        .await
        .unwrap();

    let summary = manager
        .edit(EditRequest {
            task_id: task.id,
            scope: UpdateScope::All,
            instance_date: None,
            updates: TaskUpdates {
                title: Some("Daily sync".to_string()),
                ..Default::default()
            },
            reset_exceptions: true,
        })
        .await
        .unwrap();
    assert_eq!(summary.affected, 2);

    assert!(env.repo.find_instances(task.id).await.unwrap().is_empty());
    let links = env.repo.find_calendar_events(task.id).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].series_update_scope, Some(UpdateScope::All));

    let event = env.local().find_event(&links[0].calendar_event_id).await.unwrap().unwrap();
    assert_eq!(event.summary, "Daily sync");
}

#[tokio::test]
async fn test_delete_all_removes_everything() {
    let env = setup_test_env().await;
    let task = create_series(&env, RecurrencePattern::Weekly, None).await;
    let master = env.repo.find_master_event(task.id).await.unwrap().unwrap();

    env.manager()
        .delete(DeleteRequest {
            task_id: task.id,
            scope: UpdateScope::Single,
            instance_date: Some(date(2025, 3, 10)),
        })
        .await
        .unwrap();

    let summary = env
        .manager()
        .delete(DeleteRequest {
            task_id: task.id,
            scope: UpdateScope::All,
            instance_date: None,
        })
        .await
        .unwrap();
    assert_eq!(summary.affected, 2);
    assert!(summary.is_fully_synced());

    assert!(env.repo.find_task_by_id(task.id).await.unwrap().is_none());
    assert!(env.repo.find_calendar_events(task.id).await.unwrap().is_empty());
    assert!(env.repo.find_instances(task.id).await.unwrap().is_empty());
    assert!(env.local().find_event(&master.calendar_event_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_requests_mutate_nothing() {
    let env = setup_test_env().await;
    let task = create_series(&env, RecurrencePattern::Weekly, None).await;
    let one_off = env
        .repo
        .add_task(NewTaskData {
            user_id: env.user_id,
            title: "Once".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let manager = env.manager();

    let delete = |task_id, scope, instance_date| DeleteRequest {
        task_id,
        scope,
        instance_date,
    };

    // Missing date
    assert!(matches!(
        manager.delete(delete(task.id, UpdateScope::Single, None)).await,
        Err(CoreError::InvalidInput(_))
    ));
    // Tuesday is not an occurrence of a Monday series
    assert!(matches!(
        manager.delete(delete(task.id, UpdateScope::Single, Some(date(2025, 3, 11)))).await,
        Err(CoreError::InvalidInput(_))
    ));
    // First occurrence needs scope all
    assert!(matches!(
        manager.delete(delete(task.id, UpdateScope::Future, Some(date(2025, 3, 3)))).await,
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        manager.delete(delete(one_off.id, UpdateScope::All, None)).await,
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        manager.delete(delete(Uuid::now_v7(), UpdateScope::All, None)).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        manager
            .edit(EditRequest {
                task_id: task.id,
                scope: UpdateScope::Single,
                instance_date: Some(date(2025, 3, 10)),
                updates: TaskUpdates {
                    recurrence_pattern: Some(RecurrencePattern::Daily),
                    ..Default::default()
                },
                reset_exceptions: false,
            })
            .await,
        Err(CoreError::InvalidInput(_))
    ));

    let stored = env.repo.find_task_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(stored.recurrence_ends, None);
    assert!(env.repo.find_instances(task.id).await.unwrap().is_empty());
    assert_eq!(env.repo.find_calendar_events(task.id).await.unwrap().len(), 1);
}
