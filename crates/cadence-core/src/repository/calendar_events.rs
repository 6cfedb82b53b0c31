use crate::error::CoreError;
use crate::models::{SyncStatus, TaskCalendarEvent};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

#[async_trait]
impl super::CalendarEventStore for SqliteRepository {
    async fn find_calendar_events(&self, task_id: Uuid) -> Result<Vec<TaskCalendarEvent>, CoreError> {
        let events = sqlx::query_as(
            r#"SELECT * FROM task_calendar_events WHERE task_id = $1
            ORDER BY is_master_event DESC, recurrence_instance_date"#,
        )
        .bind(task_id)
        .fetch_all(self.pool())
        .await?;
        Ok(events)
    }

    async fn find_master_event(&self, task_id: Uuid) -> Result<Option<TaskCalendarEvent>, CoreError> {
        let event = sqlx::query_as(
            "SELECT * FROM task_calendar_events WHERE task_id = $1 AND is_master_event = TRUE",
        )
        .bind(task_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(event)
    }

    async fn find_occurrence_event(
        &self,
        task_id: Uuid,
        instance_date: NaiveDate,
    ) -> Result<Option<TaskCalendarEvent>, CoreError> {
        let event = sqlx::query_as(
            "SELECT * FROM task_calendar_events WHERE task_id = $1 AND recurrence_instance_date = $2",
        )
        .bind(task_id)
        .bind(instance_date)
        .fetch_optional(self.pool())
        .await?;
        Ok(event)
    }

    async fn save_calendar_event(&self, event: &TaskCalendarEvent) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;
        Self::save_calendar_event_in_transaction(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_sync_status(&self, id: Uuid, status: SyncStatus) -> Result<(), CoreError> {
        let result = sqlx::query("UPDATE task_calendar_events SET sync_status = $1, updated_at = $2 WHERE id = $3")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("calendar event link {}", id)));
        }
        Ok(())
    }

    async fn find_failed_events(&self, user_id: Uuid) -> Result<Vec<TaskCalendarEvent>, CoreError> {
        let events = sqlx::query_as(
            "SELECT * FROM task_calendar_events WHERE user_id = $1 AND sync_status = $2 ORDER BY updated_at",
        )
        .bind(user_id)
        .bind(SyncStatus::Failed)
        .fetch_all(self.pool())
        .await?;
        Ok(events)
    }
}

impl SqliteRepository {
    /// Insert or replace a link row within an existing transaction
    pub(crate) async fn save_calendar_event_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        event: &TaskCalendarEvent,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"INSERT INTO task_calendar_events (
                id, task_id, user_id, calendar_event_id, calendar_id, event_start, event_end,
                is_master_event, is_exception, exception_type, recurrence_master_id,
                recurrence_instance_date, series_update_scope, sync_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO UPDATE SET
                calendar_event_id = excluded.calendar_event_id,
                calendar_id = excluded.calendar_id,
                event_start = excluded.event_start,
                event_end = excluded.event_end,
                is_master_event = excluded.is_master_event,
                is_exception = excluded.is_exception,
                exception_type = excluded.exception_type,
                recurrence_master_id = excluded.recurrence_master_id,
                recurrence_instance_date = excluded.recurrence_instance_date,
                series_update_scope = excluded.series_update_scope,
                sync_status = excluded.sync_status,
                updated_at = excluded.updated_at"#,
        )
        .bind(event.id)
        .bind(event.task_id)
        .bind(event.user_id)
        .bind(&event.calendar_event_id)
        .bind(&event.calendar_id)
        .bind(event.event_start)
        .bind(event.event_end)
        .bind(event.is_master_event)
        .bind(event.is_exception)
        .bind(event.exception_type)
        .bind(&event.recurrence_master_id)
        .bind(event.recurrence_instance_date)
        .bind(event.series_update_scope)
        .bind(event.sync_status)
        .bind(event.created_at)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
