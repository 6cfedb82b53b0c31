use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::models::{validate_duration, NewTaskData};
use cadence_core::repository::TaskStore;
use chrono::Utc;
use owo_colors::{OwoColorize, Style};

use super::AppContext;
use crate::cli::AddCommand;
use crate::parser::{parse_date, parse_datetime};
use crate::timezone::format_local;

pub async fn add_task(ctx: &AppContext, command: AddCommand) -> Result<()> {
    let (_, tz) = ctx.preferences().await?;
    let now = Utc::now();

    let start_instant = command
        .start
        .as_deref()
        .map(|s| parse_datetime(s, &tz, now))
        .transpose()?;
    let recurrence_ends = command
        .until
        .as_deref()
        .map(|s| parse_date(s, &tz, now))
        .transpose()?;

    if command.every.is_some() && start_instant.is_none() {
        return Err(anyhow!(CoreError::InvalidInput(
            "A recurring task needs --start to anchor its occurrences".to_string()
        )));
    }
    if let Some(minutes) = command.duration {
        validate_duration(minutes)?;
    }

    let task = ctx
        .repo
        .add_task(NewTaskData {
            user_id: ctx.user_id,
            title: command.title,
            start_instant,
            duration_minutes: command.duration,
            recurrence_pattern: command.every,
            recurrence_ends,
            ..Default::default()
        })
        .await?;

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();
    let warn_style = Style::new().yellow().bold();

    if let Some(pattern) = task.recurrence_pattern {
        println!(
            "{} Created recurring task: {}",
            "✓".style(success_style),
            task.title.bright_white().bold()
        );
        println!("  {} Task ID: {}", "→".style(info_style), task.id.to_string().yellow());
        println!("  {} Repeats {}", "→".style(info_style), pattern);

        match ctx.series().publish(task.id).await {
            Ok(link) => println!(
                "  {} Calendar event: {}",
                "→".style(info_style),
                link.calendar_event_id.bright_black()
            ),
            Err(CoreError::Calendar(e)) => println!(
                "  {} Calendar not updated: {}",
                "!".style(warn_style),
                e
            ),
            Err(e) => return Err(e.into()),
        }
    } else {
        println!(
            "{} Created task: {}",
            "✓".style(success_style),
            task.title.bright_white().bold()
        );
        println!("  {} Task ID: {}", "→".style(info_style), task.id.to_string().yellow());
        match task.start_instant {
            Some(start) => println!("  {} Starts: {}", "→".style(info_style), format_local(start, &tz)),
            None => println!(
                "  {} Unscheduled; run 'cadence schedule' to find it a slot",
                "→".style(info_style)
            ),
        }
    }

    Ok(())
}
