use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::timezone::local_date;
use chrono::Utc;
use owo_colors::OwoColorize;

use super::AppContext;
use crate::cli::OccurrencesCommand;
use crate::parser::parse_date;
use crate::util::resolve_task;
use crate::views::table::display_occurrences;

pub async fn list_occurrences(ctx: &AppContext, command: OccurrencesCommand) -> Result<()> {
    let task = resolve_task(&ctx.repo, ctx.user_id, &command.id).await?;
    if !task.is_recurring() {
        return Err(anyhow!(CoreError::InvalidInput(format!(
            "Task '{}' does not repeat",
            task.title
        ))));
    }

    let (_, tz) = ctx.preferences().await?;
    let now = Utc::now();
    let from = match command.from.as_deref() {
        Some(s) => parse_date(s, &tz, now)?,
        None => local_date(now, &tz),
    };

    let occurrences = ctx.series().occurrences(task.id, from, command.limit).await?;

    println!("{}", task.title.bright_white().bold());
    display_occurrences(&occurrences, &tz);
    Ok(())
}
