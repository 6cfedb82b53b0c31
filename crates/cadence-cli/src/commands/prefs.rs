use anyhow::Result;
use cadence_core::repository::{PreferencesReader, PreferencesStore};
use owo_colors::{OwoColorize, Style};

use super::AppContext;
use crate::cli::{PrefsAction, PrefsCommand, PrefsSetCommand};
use crate::parser::{parse_time, parse_working_days};
use crate::timezone::normalize_timezone_input;
use crate::views::table::display_preferences;

pub async fn prefs_command(ctx: &AppContext, command: PrefsCommand) -> Result<()> {
    match command.action {
        PrefsAction::Show => {
            let prefs = ctx.repo.get_preferences(ctx.user_id).await?;
            display_preferences(&prefs);
            Ok(())
        }
        PrefsAction::Set(set) => set_preferences(ctx, set).await,
    }
}

async fn set_preferences(ctx: &AppContext, command: PrefsSetCommand) -> Result<()> {
    let mut prefs = ctx.repo.get_preferences(ctx.user_id).await?;

    match command.timezone {
        Some(tz) => prefs.timezone = normalize_timezone_input(&tz)?,
        // A user's first save picks up the configured zone instead of UTC
        None if prefs.timezone == "UTC" => {
            prefs.timezone = normalize_timezone_input(&ctx.config.default_timezone)?;
        }
        None => {}
    }
    if let Some(start) = command.work_start {
        prefs.work_start_time = parse_time(&start)?;
    }
    if let Some(end) = command.work_end {
        prefs.work_end_time = parse_time(&end)?;
    }
    if let Some(days) = command.days {
        prefs.working_days = parse_working_days(&days)?;
    }
    if let Some(minutes) = command.default_duration {
        prefs.default_task_duration_minutes = minutes;
    }

    ctx.repo.save_preferences(&prefs).await?;

    let success_style = Style::new().green().bold();
    println!("{} Preferences saved", "✓".style(success_style));
    display_preferences(&prefs);
    Ok(())
}
