use anyhow::Result;
use cadence_core::repository::TaskStore;
use cadence_core::timezone::local_date;
use chrono::Utc;

use super::AppContext;
use crate::cli::ListCommand;
use crate::parser::parse_date;
use crate::views::table::display_tasks;

pub async fn list_tasks(ctx: &AppContext, command: ListCommand) -> Result<()> {
    let (prefs, tz) = ctx.preferences().await?;
    let now = Utc::now();
    let from = command.from.as_deref().map(|s| parse_date(s, &tz, now)).transpose()?;
    let to = command.to.as_deref().map(|s| parse_date(s, &tz, now)).transpose()?;
    let filtered = from.is_some() || to.is_some();

    let mut tasks: Vec<_> = ctx
        .repo
        .find_tasks_for_user(ctx.user_id)
        .await?
        .into_iter()
        .filter(|task| match task.start_instant {
            Some(start) => {
                let day = local_date(start, &tz);
                from.map_or(true, |f| day >= f) && to.map_or(true, |t| day <= t)
            }
            None => !filtered,
        })
        .collect();

    // Unscheduled tasks last
    tasks.sort_by_key(|t| (t.start_instant.is_none(), t.start_instant, t.created_at));

    display_tasks(&tasks, &prefs, &tz);
    Ok(())
}
