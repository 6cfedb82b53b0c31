use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Cancelled,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task status: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    OneOff,
    Recurring,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    Daily,
    Weekdays,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl RecurrencePattern {
    pub const ALL: [RecurrencePattern; 7] = [
        RecurrencePattern::Daily,
        RecurrencePattern::Weekdays,
        RecurrencePattern::Weekly,
        RecurrencePattern::Biweekly,
        RecurrencePattern::Monthly,
        RecurrencePattern::Quarterly,
        RecurrencePattern::Yearly,
    ];
}

impl std::fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecurrencePattern::Daily => "daily",
            RecurrencePattern::Weekdays => "weekdays",
            RecurrencePattern::Weekly => "weekly",
            RecurrencePattern::Biweekly => "biweekly",
            RecurrencePattern::Monthly => "monthly",
            RecurrencePattern::Quarterly => "quarterly",
            RecurrencePattern::Yearly => "yearly",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid recurrence pattern: {0}")]
pub struct ParseRecurrencePatternError(String);

impl FromStr for RecurrencePattern {
    type Err = ParseRecurrencePatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecurrencePattern::ALL
            .into_iter()
            .find(|p| p.to_string() == s.to_lowercase())
            .ok_or_else(|| ParseRecurrencePatternError(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    /// For a recurring task this is the series anchor, not a specific occurrence.
    pub start_instant: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub task_type: TaskType,
    pub recurrence_pattern: Option<RecurrencePattern>,
    /// Last local date on which an occurrence may fall.
    pub recurrence_ends: Option<NaiveDate>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: Uuid::nil(),
            project_id: None,
            title: String::new(),
            start_instant: None,
            duration_minutes: None,
            task_type: TaskType::OneOff,
            recurrence_pattern: None,
            recurrence_ends: None,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// Longest task a single working day can hold.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// Checks a requested duration is positive and no longer than a day.
pub fn validate_duration(minutes: i64) -> Result<(), CoreError> {
    if minutes <= 0 {
        return Err(CoreError::InvalidInput("Duration must be positive".to_string()));
    }
    if minutes > MAX_DURATION_MINUTES {
        return Err(CoreError::InvalidInput(format!(
            "Duration of {} minutes exceeds the {} minute limit",
            minutes, MAX_DURATION_MINUTES
        )));
    }
    Ok(())
}

impl Task {
    pub fn is_recurring(&self) -> bool {
        self.task_type == TaskType::Recurring
    }

    /// Checks the pattern/type pairing and the duration ceiling.
    ///
    /// Non-positive durations are tolerated here; placement falls back to the
    /// user's default for them.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(minutes) = self.duration_minutes.filter(|m| *m > MAX_DURATION_MINUTES) {
            return Err(CoreError::InvalidInput(format!(
                "Task {} lasts {} minutes, more than the {} minute limit",
                self.id, minutes, MAX_DURATION_MINUTES
            )));
        }
        match (self.task_type, self.recurrence_pattern) {
            (TaskType::Recurring, None) => Err(CoreError::InvalidInput(format!(
                "Recurring task {} has no recurrence pattern",
                self.id
            ))),
            (TaskType::OneOff, Some(_)) => Err(CoreError::InvalidInput(format!(
                "One-off task {} carries a recurrence pattern",
                self.id
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub start_instant: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    /// When present the task becomes the head of a recurring series.
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub recurrence_ends: Option<NaiveDate>,
}

impl NewTaskData {
    pub fn into_task(self) -> Task {
        let task_type = if self.recurrence_pattern.is_some() {
            TaskType::Recurring
        } else {
            TaskType::OneOff
        };
        Task {
            user_id: self.user_id,
            project_id: self.project_id,
            title: self.title,
            start_instant: self.start_instant,
            duration_minutes: self.duration_minutes,
            task_type,
            recurrence_pattern: self.recurrence_pattern,
            recurrence_ends: self.recurrence_ends,
            ..Default::default()
        }
    }
}

// ============================================================================
// Series occurrences and calendar links
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Scheduled,
    Completed,
    Skipped,
    Cancelled,
}

/// Per-occurrence deviation from the series definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_instant: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
}

impl InstanceOverride {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.start_instant.is_none() && self.duration_minutes.is_none()
    }

    /// Layers `other` on top of `self`; fields set in `other` win.
    pub fn merged_with(self, other: InstanceOverride) -> InstanceOverride {
        InstanceOverride {
            title: other.title.or(self.title),
            start_instant: other.start_instant.or(self.start_instant),
            duration_minutes: other.duration_minutes.or(self.duration_minutes),
        }
    }
}

/// A materialized occurrence of a series. Absent rows mean "as the series says".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringTaskInstance {
    pub task_id: Uuid,
    pub instance_date: NaiveDate,
    pub status: InstanceStatus,
    pub override_data: Option<InstanceOverride>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringTaskInstance {
    pub fn new(task_id: Uuid, instance_date: NaiveDate, status: InstanceStatus) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            instance_date,
            status,
            override_data: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExceptionType {
    Modified,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Failed,
    Deleted,
}

/// How far a change to a recurring task reaches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UpdateScope {
    /// Only the selected occurrence
    Single,
    /// The selected occurrence and every later one
    Future,
    /// The whole series, past occurrences included
    All,
}

impl std::fmt::Display for UpdateScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateScope::Single => write!(f, "single"),
            UpdateScope::Future => write!(f, "future"),
            UpdateScope::All => write!(f, "all"),
        }
    }
}

impl FromStr for UpdateScope {
    type Err = ParseUpdateScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" | "occurrence" | "this" => Ok(UpdateScope::Single),
            "future" | "this_and_future" => Ok(UpdateScope::Future),
            "all" | "series" | "entire" => Ok(UpdateScope::All),
            _ => Err(ParseUpdateScopeError(s.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid update scope: {0}")]
pub struct ParseUpdateScopeError(String);

/// Link between a task (or one of its occurrences) and a provider-side event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskCalendarEvent {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub calendar_event_id: String,
    pub calendar_id: String,
    pub event_start: DateTime<Utc>,
    pub event_end: DateTime<Utc>,
    /// The one event carrying the series' recurrence rule
    pub is_master_event: bool,
    pub is_exception: bool,
    pub exception_type: Option<ExceptionType>,
    /// Provider id of the master event this exception belongs to
    pub recurrence_master_id: Option<String>,
    pub recurrence_instance_date: Option<NaiveDate>,
    pub series_update_scope: Option<UpdateScope>,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskCalendarEvent {
    /// A master link for a freshly published series.
    pub fn master(
        task: &Task,
        calendar_event_id: String,
        calendar_id: String,
        event_start: DateTime<Utc>,
        event_end: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            task_id: task.id,
            user_id: task.user_id,
            calendar_event_id,
            calendar_id,
            event_start,
            event_end,
            is_master_event: true,
            is_exception: false,
            exception_type: None,
            recurrence_master_id: None,
            recurrence_instance_date: None,
            series_update_scope: None,
            sync_status: SyncStatus::Synced,
            created_at: now,
            updated_at: now,
        }
    }

    /// An exception link for one occurrence of `master`.
    pub fn exception_of(
        master: &TaskCalendarEvent,
        instance_date: NaiveDate,
        exception_type: ExceptionType,
        event_start: DateTime<Utc>,
        event_end: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            task_id: master.task_id,
            user_id: master.user_id,
            calendar_event_id: master.calendar_event_id.clone(),
            calendar_id: master.calendar_id.clone(),
            event_start,
            event_end,
            is_master_event: false,
            is_exception: true,
            exception_type: Some(exception_type),
            recurrence_master_id: Some(master.calendar_event_id.clone()),
            recurrence_instance_date: Some(instance_date),
            series_update_scope: Some(UpdateScope::Single),
            sync_status: SyncStatus::Synced,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Preferences and configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserCalendarPreferences {
    pub user_id: Uuid,
    /// IANA timezone name (e.g., "America/New_York")
    pub timezone: String,
    /// ISO weekdays, Monday = 1 .. Sunday = 7
    pub working_days: Vec<u32>,
    pub work_start_time: NaiveTime,
    pub work_end_time: NaiveTime,
    pub default_task_duration_minutes: i64,
}

impl UserCalendarPreferences {
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            timezone: "UTC".to_string(),
            working_days: vec![1, 2, 3, 4, 5],
            work_start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            work_end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            default_task_duration_minutes: 30,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        crate::timezone::validate_timezone(&self.timezone)?;
        if let Some(day) = self.working_days.iter().find(|d| !(1..=7).contains(*d)) {
            return Err(CoreError::InvalidInput(format!(
                "Working day {} is not an ISO weekday (1-7)",
                day
            )));
        }
        if self.work_end_time <= self.work_start_time {
            return Err(CoreError::InvalidInput(format!(
                "Work day ends ({}) before it starts ({})",
                self.work_end_time, self.work_start_time
            )));
        }
        validate_duration(self.default_task_duration_minutes)
    }

    pub fn is_working_day(&self, iso_weekday: u32) -> bool {
        self.working_days.contains(&iso_weekday)
    }

    /// Duration for placement; missing or non-positive values fall back to the default.
    pub fn duration_for(&self, task: &Task) -> i64 {
        task.duration_minutes
            .filter(|minutes| *minutes > 0)
            .unwrap_or(self.default_task_duration_minutes)
    }
}

/// Tuning for the slot finder.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How many days past its anchor a bumped task may move
    pub max_lookahead_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_lookahead_days: 7,
        }
    }
}

// ============================================================================
// Series change requests and results
// ============================================================================

/// Field changes requested for a task, an occurrence or a series tail.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdates {
    pub title: Option<String>,
    pub start_instant: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub recurrence_pattern: Option<RecurrencePattern>,
}

impl TaskUpdates {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.start_instant.is_none()
            && self.duration_minutes.is_none()
            && self.recurrence_pattern.is_none()
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(start) = self.start_instant {
            task.start_instant = Some(start);
        }
        if let Some(duration) = self.duration_minutes {
            task.duration_minutes = Some(duration);
        }
        if let Some(pattern) = self.recurrence_pattern {
            task.recurrence_pattern = Some(pattern);
        }
        task.updated_at = Utc::now();
    }

    pub fn as_override(&self) -> InstanceOverride {
        InstanceOverride {
            title: self.title.clone(),
            start_instant: self.start_instant,
            duration_minutes: self.duration_minutes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EditRequest {
    pub task_id: Uuid,
    pub scope: UpdateScope,
    /// Local date of the targeted occurrence; required for `single` and `future`
    pub instance_date: Option<NaiveDate>,
    pub updates: TaskUpdates,
    /// With `all` scope, drop every per-occurrence exception
    pub reset_exceptions: bool,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub task_id: Uuid,
    pub scope: UpdateScope,
    pub instance_date: Option<NaiveDate>,
}

/// Provider operation that failed while the relational side went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    ScheduleEvent,
    UpdateEvent,
    DeleteEvent,
}

impl std::fmt::Display for SyncStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStep::ScheduleEvent => write!(f, "provider schedule"),
            SyncStep::UpdateEvent => write!(f, "provider update"),
            SyncStep::DeleteEvent => write!(f, "provider delete"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncFailure {
    pub step: SyncStep,
    pub event_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SeriesChangeSummary {
    pub scope: UpdateScope,
    /// Task and instance rows written or removed
    pub affected: u64,
    /// Head of the new series created by a `future` edit
    pub new_task_id: Option<Uuid>,
    pub sync_failures: Vec<SyncFailure>,
}

impl SeriesChangeSummary {
    pub fn new(scope: UpdateScope) -> Self {
        Self {
            scope,
            affected: 0,
            new_task_id: None,
            sync_failures: Vec::new(),
        }
    }

    pub fn is_fully_synced(&self) -> bool {
        self.sync_failures.is_empty()
    }
}
