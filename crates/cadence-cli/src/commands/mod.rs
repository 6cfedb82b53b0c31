use anyhow::Result;
use cadence_core::calendar::LocalCalendarProvider;
use cadence_core::models::{UpdateScope, UserCalendarPreferences};
use cadence_core::recurrence::RRuleBuilder;
use cadence_core::repository::{PreferencesReader, SqliteRepository};
use cadence_core::series::SeriesManager;
use cadence_core::timezone::parse_timezone;
use chrono_tz::Tz;
use dialoguer::Select;
use owo_colors::OwoColorize;
use uuid::Uuid;

use crate::config::Config;

pub mod add;
pub mod delete;
pub mod edit;
pub mod list;
pub mod occurrences;
pub mod prefs;
pub mod schedule;

/// Everything a command needs, built once in `main`.
pub struct AppContext {
    pub repo: SqliteRepository,
    pub calendar: LocalCalendarProvider,
    pub rules: RRuleBuilder,
    pub user_id: Uuid,
    pub config: Config,
}

impl AppContext {
    pub fn series(&self) -> SeriesManager<'_, SqliteRepository, LocalCalendarProvider, RRuleBuilder> {
        SeriesManager::new(&self.repo, &self.calendar, &self.rules)
    }

    pub async fn preferences(&self) -> Result<(UserCalendarPreferences, Tz)> {
        let prefs = self.repo.get_preferences(self.user_id).await?;
        let tz = parse_timezone(&prefs.timezone)?;
        Ok((prefs, tz))
    }
}

/// Asks how far a change to a recurring task should reach.
pub(crate) fn prompt_scope(action: &str) -> Result<UpdateScope> {
    let options = [
        "This occurrence only",
        "This and future occurrences",
        "Entire series",
    ];

    println!("{}", "This task is part of a recurring series.".yellow());
    let selection = Select::new()
        .with_prompt(format!("How would you like to apply the {}?", action))
        .items(&options)
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => UpdateScope::Single,
        1 => UpdateScope::Future,
        _ => UpdateScope::All,
    })
}
