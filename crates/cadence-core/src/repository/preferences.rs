use crate::error::CoreError;
use crate::models::UserCalendarPreferences;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::FromRow;
use uuid::Uuid;

/// Storage shape of the preferences row; working days are a comma-separated list.
#[derive(Debug, FromRow)]
struct PreferencesRow {
    user_id: Uuid,
    timezone: String,
    working_days: String,
    work_start_time: NaiveTime,
    work_end_time: NaiveTime,
    default_task_duration_minutes: i64,
}

impl TryFrom<PreferencesRow> for UserCalendarPreferences {
    type Error = CoreError;

    fn try_from(row: PreferencesRow) -> Result<Self, Self::Error> {
        let working_days = row
            .working_days
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u32>()
                    .map_err(|_| CoreError::Corrupt(format!("working day '{}'", s)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UserCalendarPreferences {
            user_id: row.user_id,
            timezone: row.timezone,
            working_days,
            work_start_time: row.work_start_time,
            work_end_time: row.work_end_time,
            default_task_duration_minutes: row.default_task_duration_minutes,
        })
    }
}

fn encode_working_days(days: &[u32]) -> String {
    days.iter().map(u32::to_string).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl super::PreferencesReader for SqliteRepository {
    async fn get_preferences(&self, user_id: Uuid) -> Result<UserCalendarPreferences, CoreError> {
        let row: Option<PreferencesRow> =
            sqlx::query_as("SELECT * FROM user_calendar_preferences WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;

        match row {
            Some(row) => row.try_into(),
            None => Ok(UserCalendarPreferences::defaults_for(user_id)),
        }
    }
}

#[async_trait]
impl super::PreferencesStore for SqliteRepository {
    async fn save_preferences(&self, preferences: &UserCalendarPreferences) -> Result<(), CoreError> {
        preferences.validate()?;

        let mut working_days = preferences.working_days.clone();
        working_days.sort_unstable();
        working_days.dedup();

        sqlx::query(
            r#"INSERT INTO user_calendar_preferences (user_id, timezone, working_days, work_start_time, work_end_time, default_task_duration_minutes)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                timezone = excluded.timezone,
                working_days = excluded.working_days,
                work_start_time = excluded.work_start_time,
                work_end_time = excluded.work_end_time,
                default_task_duration_minutes = excluded.default_task_duration_minutes"#,
        )
        .bind(preferences.user_id)
        .bind(&preferences.timezone)
        .bind(encode_working_days(&working_days))
        .bind(preferences.work_start_time)
        .bind(preferences.work_end_time)
        .bind(preferences.default_task_duration_minutes)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
