use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::models::{Task, TaskStatus};
use cadence_core::repository::TaskStore;
use cadence_core::scheduler::SlotFinder;
use cadence_core::timezone::local_date;
use chrono::{Days, NaiveDate, Utc};
use tracing::debug;

use super::AppContext;
use crate::cli::ScheduleCommand;
use crate::parser::parse_date;
use crate::views::table::{display_schedule_report, display_tasks};

const DEFAULT_WINDOW_DAYS: u64 = 7;

pub async fn schedule_tasks(ctx: &AppContext, command: ScheduleCommand) -> Result<()> {
    let (prefs, tz) = ctx.preferences().await?;
    let now = Utc::now();

    let from = match command.from.as_deref() {
        Some(s) => parse_date(s, &tz, now)?,
        None => local_date(now, &tz),
    };
    let to = match command.to.as_deref() {
        Some(s) => parse_date(s, &tz, now)?,
        None => from
            .checked_add_days(Days::new(DEFAULT_WINDOW_DAYS))
            .ok_or_else(|| anyhow!("Date {} is out of range", from))?,
    };
    if to < from {
        return Err(anyhow!(CoreError::InvalidInput(format!(
            "--to ({}) is before --from ({})",
            to, from
        ))));
    }

    let tasks: Vec<Task> = ctx
        .repo
        .find_tasks_for_user(ctx.user_id)
        .await?
        .into_iter()
        .filter(|t| schedulable(t, from, to, &tz))
        .collect();
    debug!(count = tasks.len(), %from, %to, "tasks selected for scheduling");

    if tasks.is_empty() {
        println!("Nothing to schedule between {} and {}.", from, to);
        return Ok(());
    }

    let finder = SlotFinder::new(&ctx.repo, ctx.config.scheduler());
    let outcome = finder.plan(tasks, ctx.user_id, now).await?;

    if !command.dry_run {
        ctx.repo.update_task_starts(&outcome.tasks).await?;
    }

    display_tasks(&outcome.tasks, &prefs, &tz);
    display_schedule_report(&outcome.report, !command.dry_run);
    Ok(())
}

/// Pending one-off tasks that are unscheduled or start inside `[from, to]`.
fn schedulable(task: &Task, from: NaiveDate, to: NaiveDate, tz: &chrono_tz::Tz) -> bool {
    if task.is_recurring() || task.status != TaskStatus::Pending {
        return false;
    }
    match task.start_instant {
        Some(start) => {
            let day = local_date(start, tz);
            day >= from && day <= to
        }
        None => true,
    }
}
