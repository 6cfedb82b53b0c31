use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use super::{
    CalendarError, CalendarProvider, DeleteEventRequest, ScheduleEventRequest, ScheduledEvent,
    UpdateEventRequest,
};
use crate::db::DbPool;
use crate::models::UpdateScope;
use crate::timezone;

pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Provider-side event as the local calendar stores it.
#[derive(Debug, Clone, FromRow)]
pub struct ProviderEvent {
    pub event_id: String,
    pub user_id: Uuid,
    pub calendar_id: String,
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub recurrence_rule: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Single-occurrence modification of a recurring provider event.
#[derive(Debug, Clone, FromRow)]
pub struct ProviderEventOverride {
    pub event_id: String,
    pub instance_date: NaiveDate,
    pub summary: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub cancelled: bool,
}

/// Calendar kept in the local database, standing in for a hosted provider.
#[derive(Clone)]
pub struct LocalCalendarProvider {
    pool: DbPool,
}

impl LocalCalendarProvider {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_event(&self, event_id: &str) -> Result<Option<ProviderEvent>, CalendarError> {
        let event = sqlx::query_as("SELECT * FROM provider_events WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    pub async fn find_overrides(&self, event_id: &str) -> Result<Vec<ProviderEventOverride>, CalendarError> {
        let overrides = sqlx::query_as(
            "SELECT * FROM provider_event_overrides WHERE event_id = $1 ORDER BY instance_date",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(overrides)
    }

    async fn update_occurrence(
        &self,
        request: &UpdateEventRequest,
        instance_date: NaiveDate,
    ) -> Result<(), CalendarError> {
        sqlx::query(
            r#"INSERT INTO provider_event_overrides (event_id, instance_date, summary, start_time, end_time, cancelled)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id, instance_date) DO UPDATE SET
                summary = COALESCE(excluded.summary, provider_event_overrides.summary),
                start_time = COALESCE(excluded.start_time, provider_event_overrides.start_time),
                end_time = COALESCE(excluded.end_time, provider_event_overrides.end_time),
                cancelled = excluded.cancelled"#,
        )
        .bind(&request.event_id)
        .bind(instance_date)
        .bind(&request.summary)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(request.cancelled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_series(&self, request: &UpdateEventRequest) -> Result<(), CalendarError> {
        sqlx::query(
            r#"UPDATE provider_events SET
                summary = COALESCE($1, summary),
                start_time = COALESCE($2, start_time),
                end_time = COALESCE($3, end_time),
                recurrence_rule = COALESCE($4, recurrence_rule),
                updated_at = $5
            WHERE event_id = $6"#,
        )
        .bind(&request.summary)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(&request.recurrence_rule)
        .bind(Utc::now())
        .bind(&request.event_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CalendarProvider for LocalCalendarProvider {
    async fn schedule_task(
        &self,
        user_id: Uuid,
        request: ScheduleEventRequest,
    ) -> Result<ScheduledEvent, CalendarError> {
        if request.duration_minutes <= 0 {
            return Err(CalendarError::Rejected(format!(
                "Event for task {} has no duration",
                request.task_id
            )));
        }

        let event_id = Uuid::now_v7().simple().to_string();
        let calendar_id = request
            .calendar_id
            .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string());
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO provider_events (event_id, user_id, calendar_id, summary, start_time, end_time, recurrence_rule, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(&event_id)
        .bind(user_id)
        .bind(&calendar_id)
        .bind(&request.summary)
        .bind(request.start_time)
        .bind(timezone::end_after(request.start_time, request.duration_minutes))
        .bind(&request.recurrence_rule)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(%user_id, task_id = %request.task_id, event_id = %event_id, "scheduled local calendar event");

        Ok(ScheduledEvent {
            event_link: format!("cadence://calendar/{}/{}", calendar_id, event_id),
            event_id,
            calendar_id,
        })
    }

    async fn update_event(&self, _user_id: Uuid, request: UpdateEventRequest) -> Result<(), CalendarError> {
        if self.find_event(&request.event_id).await?.is_none() {
            return Err(CalendarError::EventNotFound(request.event_id));
        }

        match (request.update_scope, request.instance_date) {
            (Some(UpdateScope::Single), Some(instance_date)) => {
                self.update_occurrence(&request, instance_date).await
            }
            (Some(UpdateScope::Single), None) => Err(CalendarError::Rejected(
                "Single-occurrence update needs an instance date".to_string(),
            )),
            _ => self.update_series(&request).await,
        }
    }

    async fn delete_event(&self, _user_id: Uuid, request: DeleteEventRequest) -> Result<(), CalendarError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM provider_event_overrides WHERE event_id = $1")
            .bind(&request.event_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM provider_events WHERE event_id = $1 AND calendar_id = $2")
            .bind(&request.event_id)
            .bind(&request.calendar_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CalendarError::EventNotFound(request.event_id));
        }

        tx.commit().await?;
        Ok(())
    }
}
