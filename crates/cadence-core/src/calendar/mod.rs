//! Calendar provider boundary.
//!
//! The engine talks to a calendar service only through [`CalendarProvider`].
//! [`LocalCalendarProvider`] keeps provider-side events in the same SQLite
//! database and is what the CLI uses.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::UpdateScope;

pub mod local;

pub use local::LocalCalendarProvider;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Calendar event not found: {0}")]
    EventNotFound(String),

    #[error("Calendar request rejected: {0}")]
    Rejected(String),

    #[error("Calendar provider unavailable: {0}")]
    Unavailable(String),

    #[error("Calendar storage error")]
    Storage(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEventRequest {
    pub task_id: Uuid,
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub calendar_id: Option<String>,
    /// `RRULE` value for a series master; `None` for a single event
    pub recurrence_rule: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub event_id: String,
    pub event_link: String,
    pub calendar_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub event_id: String,
    pub calendar_id: String,
    pub update_scope: Option<UpdateScope>,
    /// Addresses one occurrence of the series `event_id` when `update_scope` is `Single`
    pub instance_date: Option<NaiveDate>,
    pub summary: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub recurrence_rule: Option<String>,
    /// Cancels the addressed occurrence instead of modifying it
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteEventRequest {
    pub event_id: String,
    pub calendar_id: String,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn schedule_task(
        &self,
        user_id: Uuid,
        request: ScheduleEventRequest,
    ) -> Result<ScheduledEvent, CalendarError>;

    async fn update_event(&self, user_id: Uuid, request: UpdateEventRequest) -> Result<(), CalendarError>;

    async fn delete_event(&self, user_id: Uuid, request: DeleteEventRequest) -> Result<(), CalendarError>;
}
