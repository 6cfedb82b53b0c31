use cadence_core::models::{RecurrencePattern, UpdateScope};
use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Cadence: fits tasks into your working hours and keeps recurring series in sync
#[derive(Parser, Debug)]
#[command(name = "cadence", author, version, long_about = None)]
pub struct Cli {
    /// User to act for (defaults to `user_id` from the configuration)
    #[arg(long, global = true)]
    pub user: Option<Uuid>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show or change working-hour preferences
    Prefs(PrefsCommand),
    /// Add a new task or recurring series
    Add(AddCommand),
    /// List tasks
    List(ListCommand),
    /// Place one-off tasks into free working time
    Schedule(ScheduleCommand),
    /// Edit a task, an occurrence or a series
    Edit(EditCommand),
    /// Delete a task, an occurrence or a series
    Delete(DeleteCommand),
    /// List upcoming occurrences of a recurring series
    Occurrences(OccurrencesCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct PrefsCommand {
    #[command(subcommand)]
    pub action: PrefsAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PrefsAction {
    /// Show the current preferences
    Show,
    /// Change one or more preferences
    Set(PrefsSetCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct PrefsSetCommand {
    /// IANA timezone, e.g. 'Europe/Berlin'
    #[arg(long)]
    pub timezone: Option<String>,
    /// Start of the working day (HH:MM)
    #[arg(long)]
    pub work_start: Option<String>,
    /// End of the working day (HH:MM)
    #[arg(long)]
    pub work_end: Option<String>,
    /// Working days, e.g. '1,2,3,4,5' or 'mon,tue,wed'
    #[arg(long)]
    pub days: Option<String>,
    /// Duration in minutes for tasks that have none
    #[arg(long)]
    pub default_duration: Option<i64>,
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// The title of the task
    pub title: String,
    /// When the task starts (e.g. '2025-03-10 09:00', 'tomorrow 2pm')
    #[arg(short, long)]
    pub start: Option<String>,
    /// Duration in minutes
    #[arg(short, long)]
    pub duration: Option<i64>,
    /// Repeat the task (daily, weekdays, weekly, biweekly, monthly, quarterly, yearly)
    #[arg(long)]
    pub every: Option<RecurrencePattern>,
    /// Last date an occurrence may fall on
    #[arg(long, requires = "every")]
    pub until: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Only tasks starting on or after this date
    #[arg(long)]
    pub from: Option<String>,
    /// Only tasks starting on or before this date
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ScheduleCommand {
    /// First day to schedule (default: today)
    #[arg(long)]
    pub from: Option<String>,
    /// Last day to schedule (default: a week from the first day)
    #[arg(long)]
    pub to: Option<String>,
    /// Show the plan without saving it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    /// The ID (or ID prefix) of the task to edit
    pub id: String,
    /// How far the change reaches for a recurring task (single|future|all)
    #[arg(long)]
    pub scope: Option<UpdateScope>,
    /// Date of the occurrence for 'single' and 'future'
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub start: Option<String>,
    /// Duration in minutes
    #[arg(long)]
    pub duration: Option<i64>,
    /// New recurrence pattern ('future' and 'all' only)
    #[arg(long)]
    pub every: Option<RecurrencePattern>,
    /// Drop every per-occurrence change ('all' only)
    #[arg(long)]
    pub reset_exceptions: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// The ID (or ID prefix) of the task to delete
    pub id: String,
    /// How far the deletion reaches for a recurring task (single|future|all)
    #[arg(long)]
    pub scope: Option<UpdateScope>,
    /// Date of the occurrence for 'single' and 'future'
    #[arg(long)]
    pub date: Option<String>,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct OccurrencesCommand {
    /// The ID (or ID prefix) of the series
    pub id: String,
    /// First date to show (default: today)
    #[arg(long)]
    pub from: Option<String>,
    /// How many occurrences to show
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,
}
