use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::models::{validate_duration, EditRequest, Task, TaskUpdates};
use cadence_core::repository::TaskStore;
use chrono::Utc;
use chrono_tz::Tz;
use owo_colors::{OwoColorize, Style};

use super::{prompt_scope, AppContext};
use crate::cli::EditCommand;
use crate::parser::{parse_date, parse_datetime};
use crate::timezone::format_local;
use crate::util::resolve_task;
use crate::views::table::display_change_summary;

pub async fn edit_task(ctx: &AppContext, command: EditCommand) -> Result<()> {
    let task = resolve_task(&ctx.repo, ctx.user_id, &command.id).await?;
    let (_, tz) = ctx.preferences().await?;
    let now = Utc::now();

    let updates = TaskUpdates {
        title: command.title,
        start_instant: command
            .start
            .as_deref()
            .map(|s| parse_datetime(s, &tz, now))
            .transpose()?,
        duration_minutes: command.duration,
        recurrence_pattern: command.every,
    };

    if !task.is_recurring() {
        return edit_one_off(ctx, task, updates, &tz).await;
    }

    let scope = match command.scope {
        Some(scope) => scope,
        None => prompt_scope("changes")?,
    };
    let instance_date = command
        .date
        .as_deref()
        .map(|s| parse_date(s, &tz, now))
        .transpose()?;

    let summary = ctx
        .series()
        .edit(EditRequest {
            task_id: task.id,
            scope,
            instance_date,
            updates,
            reset_exceptions: command.reset_exceptions,
        })
        .await?;

    display_change_summary("Edit", &summary);
    Ok(())
}

async fn edit_one_off(ctx: &AppContext, mut task: Task, updates: TaskUpdates, tz: &Tz) -> Result<()> {
    if updates.recurrence_pattern.is_some() {
        return Err(anyhow!(CoreError::InvalidInput(
            "A one-off task cannot be turned into a series; add a recurring task instead".to_string()
        )));
    }
    if updates.is_empty() {
        return Err(anyhow!(CoreError::InvalidInput("No changes requested".to_string())));
    }
    if updates.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(anyhow!(CoreError::InvalidInput("Title cannot be empty".to_string())));
    }
    if let Some(minutes) = updates.duration_minutes {
        validate_duration(minutes)?;
    }

    updates.apply_to(&mut task);
    ctx.repo.update_task(&task).await?;

    let success_style = Style::new().green().bold();
    println!(
        "{} Updated task: {}",
        "✓".style(success_style),
        task.title.bright_white().bold()
    );
    if let Some(start) = task.start_instant {
        println!("  → Starts: {}", format_local(start, tz));
    }
    Ok(())
}
