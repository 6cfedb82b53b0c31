use crate::error::CoreError;
use crate::models::{NewTaskData, Task, TaskStatus};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

#[async_trait]
impl super::TaskReader for SqliteRepository {
    async fn list_tasks(
        &self,
        user_id: Uuid,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<Task>, CoreError> {
        let tasks = sqlx::query_as(
            r#"SELECT * FROM tasks
            WHERE user_id = $1 AND status = $2
              AND start_instant IS NOT NULL AND start_instant >= $3 AND start_instant < $4
            ORDER BY start_instant"#,
        )
        .bind(user_id)
        .bind(TaskStatus::Pending)
        .bind(range_start)
        .bind(range_end)
        .fetch_all(self.pool())
        .await?;
        Ok(tasks)
    }
}

#[async_trait]
impl super::TaskStore for SqliteRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        let task = data.into_task();
        task.validate()?;
        self.insert_task(&task).await?;
        Ok(task)
    }

    async fn insert_task(&self, task: &Task) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;
        Self::insert_task_in_transaction(&mut tx, task).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    async fn find_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, CoreError> {
        let tasks = sqlx::query_as(
            "SELECT * FROM tasks WHERE user_id = $1 ORDER BY start_instant IS NULL, start_instant, created_at",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(tasks)
    }

    async fn update_task(&self, task: &Task) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;
        Self::update_task_in_transaction(&mut tx, task).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn update_task_starts(&self, tasks: &[Task]) -> Result<u64, CoreError> {
        let mut tx = self.pool().begin().await?;
        let mut updated = 0;

        for task in tasks {
            let result = sqlx::query("UPDATE tasks SET start_instant = $1, updated_at = $2 WHERE id = $3")
                .bind(task.start_instant)
                .bind(Utc::now())
                .bind(task.id)
                .execute(&mut *tx)
                .await?;
            updated += result.rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }
}

impl SqliteRepository {
    /// Add a task within an existing transaction
    pub(crate) async fn insert_task_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        task: &Task,
    ) -> Result<(), CoreError> {
        task.validate()?;
        sqlx::query(
            r#"INSERT INTO tasks (id, user_id, project_id, title, start_instant, duration_minutes, task_type, recurrence_pattern, recurrence_ends, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
        )
        .bind(task.id)
        .bind(task.user_id)
        .bind(task.project_id)
        .bind(&task.title)
        .bind(task.start_instant)
        .bind(task.duration_minutes)
        .bind(task.task_type)
        .bind(task.recurrence_pattern)
        .bind(task.recurrence_ends)
        .bind(task.status)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Replace every mutable column of a task within an existing transaction
    pub(crate) async fn update_task_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        task: &Task,
    ) -> Result<(), CoreError> {
        task.validate()?;
        let result = sqlx::query(
            r#"UPDATE tasks SET
                project_id = $1, title = $2, start_instant = $3, duration_minutes = $4,
                task_type = $5, recurrence_pattern = $6, recurrence_ends = $7, status = $8,
                updated_at = $9
            WHERE id = $10"#,
        )
        .bind(task.project_id)
        .bind(&task.title)
        .bind(task.start_instant)
        .bind(task.duration_minutes)
        .bind(task.task_type)
        .bind(task.recurrence_pattern)
        .bind(task.recurrence_ends)
        .bind(task.status)
        .bind(Utc::now())
        .bind(task.id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(task.id.to_string()));
        }
        Ok(())
    }
}
