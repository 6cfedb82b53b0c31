use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    NewTaskData, RecurringTaskInstance, SyncStatus, Task, TaskCalendarEvent,
    UserCalendarPreferences,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

// Re-export domain modules
pub mod calendar_events;
pub mod instances;
pub mod preferences;
pub mod series;
pub mod tasks;

/// Range read used by the slot finder.
#[async_trait]
pub trait TaskReader: Send + Sync {
    /// Pending tasks of `user_id` whose start falls in `[range_start, range_end)`.
    async fn list_tasks(
        &self,
        user_id: Uuid,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<Task>, CoreError>;
}

#[async_trait]
pub trait PreferencesReader: Send + Sync {
    /// Stored preferences, or the defaults when the user never saved any.
    async fn get_preferences(&self, user_id: Uuid) -> Result<UserCalendarPreferences, CoreError>;
}

#[async_trait]
pub trait PreferencesStore: PreferencesReader {
    async fn save_preferences(&self, preferences: &UserCalendarPreferences) -> Result<(), CoreError>;
}

/// Domain-specific trait for task rows
#[async_trait]
pub trait TaskStore: TaskReader {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError>;
    async fn insert_task(&self, task: &Task) -> Result<(), CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, CoreError>;
    async fn update_task(&self, task: &Task) -> Result<(), CoreError>;
    /// Removes a task; its instances and links go with it.
    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError>;
    /// Persists the start instants chosen by a scheduling run.
    async fn update_task_starts(&self, tasks: &[Task]) -> Result<u64, CoreError>;
}

/// Domain-specific trait for materialized occurrences
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Inserts or updates `(task_id, instance_date)`; overrides are merged field by field.
    async fn upsert_instance(
        &self,
        instance: &RecurringTaskInstance,
    ) -> Result<RecurringTaskInstance, CoreError>;
    async fn find_instance(
        &self,
        task_id: Uuid,
        instance_date: NaiveDate,
    ) -> Result<Option<RecurringTaskInstance>, CoreError>;
    async fn find_instances(&self, task_id: Uuid) -> Result<Vec<RecurringTaskInstance>, CoreError>;
}

/// Domain-specific trait for task/provider event links
#[async_trait]
pub trait CalendarEventStore: Send + Sync {
    async fn find_calendar_events(&self, task_id: Uuid) -> Result<Vec<TaskCalendarEvent>, CoreError>;
    async fn find_master_event(&self, task_id: Uuid) -> Result<Option<TaskCalendarEvent>, CoreError>;
    async fn find_occurrence_event(
        &self,
        task_id: Uuid,
        instance_date: NaiveDate,
    ) -> Result<Option<TaskCalendarEvent>, CoreError>;
    /// Inserts the link or replaces the row with the same id.
    async fn save_calendar_event(&self, event: &TaskCalendarEvent) -> Result<(), CoreError>;
    async fn set_sync_status(&self, id: Uuid, status: SyncStatus) -> Result<(), CoreError>;
    /// Links whose last provider call failed, for later reconciliation.
    async fn find_failed_events(&self, user_id: Uuid) -> Result<Vec<TaskCalendarEvent>, CoreError>;
}

/// What happens to occurrence records past a series cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesTail {
    /// Remove them; a new series takes over those dates
    Drop,
    /// Keep them as cancelled tombstones
    Cancel,
}

/// Multi-row series changes, each applied in one transaction.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Saves `task` (already carrying its new `recurrence_ends`) and applies
    /// `tail` to instances and exception links dated on or after `from`.
    /// Returns the number of instance rows touched.
    async fn truncate_series(&self, task: &Task, from: NaiveDate, tail: SeriesTail) -> Result<u64, CoreError>;
    /// Removes every instance row and exception link of a series.
    async fn reset_exceptions(&self, task_id: Uuid) -> Result<u64, CoreError>;
    /// Removes links, instances and the task row. Returns instance rows removed.
    async fn delete_series(&self, task_id: Uuid) -> Result<u64, CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository:
    TaskStore + PreferencesStore + InstanceStore + CalendarEventStore + SeriesStore
{
}

impl<T> Repository for T where
    T: TaskStore + PreferencesStore + InstanceStore + CalendarEventStore + SeriesStore
{
}

/// SQLite implementation of the repository pattern
#[derive(Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}
