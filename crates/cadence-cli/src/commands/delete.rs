use anyhow::Result;
use cadence_core::models::{DeleteRequest, UpdateScope};
use cadence_core::repository::TaskStore;
use chrono::Utc;
use dialoguer::Confirm;

use super::{prompt_scope, AppContext};
use crate::cli::DeleteCommand;
use crate::parser::parse_date;
use crate::util::resolve_task;
use crate::views::table::display_change_summary;

pub async fn delete_task(ctx: &AppContext, command: DeleteCommand) -> Result<()> {
    let task = resolve_task(&ctx.repo, ctx.user_id, &command.id).await?;

    if !task.is_recurring() {
        if !command.force && !confirm(&format!("Are you sure you want to delete task '{}'?", task.title))? {
            println!("Deletion cancelled.");
            return Ok(());
        }
        ctx.repo.delete_task(task.id).await?;
        println!("Task deleted successfully.");
        return Ok(());
    }

    let scope = match command.scope {
        Some(scope) => scope,
        None => prompt_scope("deletion")?,
    };
    if scope == UpdateScope::All
        && !command.force
        && !confirm(&format!(
            "Delete every occurrence of '{}' and its calendar event?",
            task.title
        ))?
    {
        println!("Deletion cancelled.");
        return Ok(());
    }

    let (_, tz) = ctx.preferences().await?;
    let instance_date = command
        .date
        .as_deref()
        .map(|s| parse_date(s, &tz, Utc::now()))
        .transpose()?;

    let summary = ctx
        .series()
        .delete(DeleteRequest {
            task_id: task.id,
            scope,
            instance_date,
        })
        .await?;

    display_change_summary("Delete", &summary);
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false))
}
