use crate::error::CoreError;
use crate::models::{InstanceOverride, InstanceStatus, RecurringTaskInstance};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, Sqlite, Transaction};
use uuid::Uuid;

/// Storage shape of an instance row; the override is kept as JSON text.
#[derive(Debug, FromRow)]
pub(crate) struct InstanceRow {
    task_id: Uuid,
    instance_date: NaiveDate,
    status: InstanceStatus,
    override_data: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InstanceRow> for RecurringTaskInstance {
    type Error = CoreError;

    fn try_from(row: InstanceRow) -> Result<Self, Self::Error> {
        let override_data = row
            .override_data
            .map(|json| serde_json::from_str::<InstanceOverride>(&json))
            .transpose()
            .map_err(|e| CoreError::Corrupt(format!("instance override: {}", e)))?;

        Ok(RecurringTaskInstance {
            task_id: row.task_id,
            instance_date: row.instance_date,
            status: row.status,
            override_data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn encode_override(data: &Option<InstanceOverride>) -> Result<Option<String>, CoreError> {
    data.as_ref()
        .filter(|o| !o.is_empty())
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| CoreError::InvalidInput(format!("instance override: {}", e)))
}

#[async_trait]
impl super::InstanceStore for SqliteRepository {
    async fn upsert_instance(
        &self,
        instance: &RecurringTaskInstance,
    ) -> Result<RecurringTaskInstance, CoreError> {
        let mut tx = self.pool().begin().await?;
        let saved = Self::upsert_instance_in_transaction(&mut tx, instance).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn find_instance(
        &self,
        task_id: Uuid,
        instance_date: NaiveDate,
    ) -> Result<Option<RecurringTaskInstance>, CoreError> {
        let row: Option<InstanceRow> = sqlx::query_as(
            "SELECT * FROM recurring_task_instances WHERE task_id = $1 AND instance_date = $2",
        )
        .bind(task_id)
        .bind(instance_date)
        .fetch_optional(self.pool())
        .await?;
        row.map(RecurringTaskInstance::try_from).transpose()
    }

    async fn find_instances(&self, task_id: Uuid) -> Result<Vec<RecurringTaskInstance>, CoreError> {
        let rows: Vec<InstanceRow> = sqlx::query_as(
            "SELECT * FROM recurring_task_instances WHERE task_id = $1 ORDER BY instance_date",
        )
        .bind(task_id)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(RecurringTaskInstance::try_from).collect()
    }
}

impl SqliteRepository {
    /// Insert or merge an instance row within an existing transaction
    pub(crate) async fn upsert_instance_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        instance: &RecurringTaskInstance,
    ) -> Result<RecurringTaskInstance, CoreError> {
        let existing: Option<InstanceRow> = sqlx::query_as(
            "SELECT * FROM recurring_task_instances WHERE task_id = $1 AND instance_date = $2",
        )
        .bind(instance.task_id)
        .bind(instance.instance_date)
        .fetch_optional(&mut **tx)
        .await?;

        let now = Utc::now();
        let merged = match existing {
            Some(row) => {
                let current = RecurringTaskInstance::try_from(row)?;
                let override_data = match (current.override_data, instance.override_data.clone()) {
                    (Some(old), Some(new)) => Some(old.merged_with(new)),
                    (old, new) => new.or(old),
                };
                RecurringTaskInstance {
                    status: instance.status,
                    override_data,
                    created_at: current.created_at,
                    updated_at: now,
                    ..instance.clone()
                }
            }
            None => RecurringTaskInstance {
                created_at: now,
                updated_at: now,
                ..instance.clone()
            },
        };

        sqlx::query(
            r#"INSERT INTO recurring_task_instances (task_id, instance_date, status, override_data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (task_id, instance_date) DO UPDATE SET
                status = excluded.status,
                override_data = excluded.override_data,
                updated_at = excluded.updated_at"#,
        )
        .bind(merged.task_id)
        .bind(merged.instance_date)
        .bind(merged.status)
        .bind(encode_override(&merged.override_data)?)
        .bind(merged.created_at)
        .bind(merged.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(merged)
    }
}
