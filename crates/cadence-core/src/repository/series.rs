use crate::error::CoreError;
use crate::models::{ExceptionType, InstanceStatus, SyncStatus, Task};
use crate::repository::{SeriesTail, SqliteRepository};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

#[async_trait]
impl super::SeriesStore for SqliteRepository {
    async fn truncate_series(&self, task: &Task, from: NaiveDate, tail: SeriesTail) -> Result<u64, CoreError> {
        let mut tx = self.pool().begin().await?;

        Self::update_task_in_transaction(&mut tx, task).await?;

        let touched = match tail {
            SeriesTail::Drop => {
                let instances = sqlx::query(
                    "DELETE FROM recurring_task_instances WHERE task_id = $1 AND instance_date >= $2",
                )
                .bind(task.id)
                .bind(from)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"DELETE FROM task_calendar_events
                    WHERE task_id = $1 AND is_master_event = FALSE AND recurrence_instance_date >= $2"#,
                )
                .bind(task.id)
                .bind(from)
                .execute(&mut *tx)
                .await?;

                instances.rows_affected()
            }
            SeriesTail::Cancel => {
                let now = Utc::now();
                let instances = sqlx::query(
                    r#"UPDATE recurring_task_instances SET status = $1, updated_at = $2
                    WHERE task_id = $3 AND instance_date >= $4"#,
                )
                .bind(InstanceStatus::Cancelled)
                .bind(now)
                .bind(task.id)
                .bind(from)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"UPDATE task_calendar_events
                    SET is_exception = TRUE, exception_type = $1, sync_status = $2, updated_at = $3
                    WHERE task_id = $4 AND is_master_event = FALSE AND recurrence_instance_date >= $5"#,
                )
                .bind(ExceptionType::Cancelled)
                .bind(SyncStatus::Deleted)
                .bind(now)
                .bind(task.id)
                .bind(from)
                .execute(&mut *tx)
                .await?;

                instances.rows_affected()
            }
        };

        tx.commit().await?;
        Ok(touched)
    }

    async fn reset_exceptions(&self, task_id: Uuid) -> Result<u64, CoreError> {
        let mut tx = self.pool().begin().await?;

        let instances = sqlx::query("DELETE FROM recurring_task_instances WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM task_calendar_events WHERE task_id = $1 AND is_master_event = FALSE")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(instances.rows_affected())
    }

    async fn delete_series(&self, task_id: Uuid) -> Result<u64, CoreError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM task_calendar_events WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        let instances = sqlx::query("DELETE FROM recurring_task_instances WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        let task = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        if task.rows_affected() == 0 {
            return Err(CoreError::NotFound(task_id.to_string()));
        }

        tx.commit().await?;
        Ok(instances.rows_affected())
    }
}
