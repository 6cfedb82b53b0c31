use cadence_core::models::{
    SeriesChangeSummary, Task, TaskStatus, UserCalendarPreferences,
};
use cadence_core::scheduler::ScheduleReport;
use cadence_core::series::Occurrence;
use chrono::Utc;
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use owo_colors::{OwoColorize, Style};
use uuid::Uuid;

use crate::timezone::format_local;

pub fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

pub fn display_tasks(tasks: &[Task], prefs: &UserCalendarPreferences, tz: &Tz) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let now = Utc::now();
    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Start", "Duration", "Repeats", "Status"]);

    for task in tasks {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(task.id)));

        let mut title = String::new();
        if task.is_recurring() {
            title.push_str("↻ ");
        }
        title.push_str(&task.title);
        let title_cell = match task.status {
            TaskStatus::Completed | TaskStatus::Cancelled => Cell::new(title)
                .add_attribute(Attribute::CrossedOut)
                .fg(Color::DarkGrey),
            TaskStatus::Pending => Cell::new(title),
        };
        row.add_cell(title_cell);

        let start_cell = match task.start_instant {
            Some(start) => {
                let cell = Cell::new(format_local(start, tz));
                if task.status == TaskStatus::Pending && !task.is_recurring() && start < now {
                    cell.fg(Color::Red)
                } else {
                    cell
                }
            }
            None => Cell::new("Unscheduled").fg(Color::Yellow),
        };
        row.add_cell(start_cell);

        let minutes = task.duration_minutes.filter(|m| *m > 0);
        row.add_cell(Cell::new(match minutes {
            Some(m) => format!("{}m", m),
            None => format!("{}m (default)", prefs.default_task_duration_minutes),
        }));

        row.add_cell(Cell::new(match (task.recurrence_pattern, task.recurrence_ends) {
            (Some(pattern), Some(until)) => format!("{} until {}", pattern, until),
            (Some(pattern), None) => pattern.to_string(),
            (None, _) => "-".to_string(),
        }));

        let status_cell = Cell::new(format!("{:?}", task.status));
        row.add_cell(match task.status {
            TaskStatus::Completed => status_cell.fg(Color::Green),
            TaskStatus::Cancelled => status_cell.fg(Color::DarkGrey),
            TaskStatus::Pending => status_cell,
        });
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_preferences(prefs: &UserCalendarPreferences) {
    let days = prefs
        .working_days
        .iter()
        .map(|d| match d {
            1 => "Mon",
            2 => "Tue",
            3 => "Wed",
            4 => "Thu",
            5 => "Fri",
            6 => "Sat",
            _ => "Sun",
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut table = Table::new();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["User".to_string(), prefs.user_id.to_string()]);
    table.add_row(vec!["Timezone".to_string(), prefs.timezone.clone()]);
    table.add_row(vec!["Working days".to_string(), days]);
    table.add_row(vec![
        "Working hours".to_string(),
        format!(
            "{} - {}",
            prefs.work_start_time.format("%H:%M"),
            prefs.work_end_time.format("%H:%M")
        ),
    ]);
    table.add_row(vec![
        "Default duration".to_string(),
        format!("{}m", prefs.default_task_duration_minutes),
    ]);
    println!("{table}");
}

pub fn display_occurrences(occurrences: &[Occurrence], tz: &Tz) {
    if occurrences.is_empty() {
        println!("No upcoming occurrences.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Start", "Title", "Duration", "Status"]);
    for occurrence in occurrences {
        let mut title = occurrence.title.clone();
        if occurrence.is_exception {
            title.push_str(" ⚠");
        }
        table.add_row(vec![
            Cell::new(occurrence.date),
            Cell::new(format_local(occurrence.start, tz)),
            Cell::new(title),
            Cell::new(format!("{}m", occurrence.duration_minutes)),
            Cell::new(format!("{:?}", occurrence.status)),
        ]);
    }
    println!("{table}");
}

pub fn display_schedule_report(report: &ScheduleReport, saved: bool) {
    let success_style = Style::new().green().bold();
    let warn_style = Style::new().yellow().bold();

    println!(
        "{} {} placed, {} moved to a later day, {} left unscheduled",
        "✓".style(success_style),
        report.placed.len(),
        report.rescheduled.len(),
        report.unplaced.len()
    );
    for id in &report.unplaced {
        println!("  {} No free slot for {}", "!".style(warn_style), short_id(*id).yellow());
    }
    if !saved {
        println!("  {}", "Dry run: nothing was saved".bright_black());
    }
}

pub fn display_change_summary(action: &str, summary: &SeriesChangeSummary) {
    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();
    let warn_style = Style::new().yellow().bold();

    println!(
        "{} {} applied to {} ({} rows changed)",
        "✓".style(success_style),
        action,
        summary.scope.to_string().bright_white().bold(),
        summary.affected
    );
    if let Some(id) = summary.new_task_id {
        println!("  {} New series: {}", "→".style(info_style), id.to_string().yellow());
    }
    for failure in &summary.sync_failures {
        println!(
            "  {} Calendar not updated ({}): {}",
            "!".style(warn_style),
            failure.step,
            failure.message
        );
    }
}
