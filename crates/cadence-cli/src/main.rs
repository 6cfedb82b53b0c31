use cadence_core::calendar::LocalCalendarProvider;
use cadence_core::db;
use cadence_core::error::CoreError;
use cadence_core::recurrence::RRuleBuilder;
use cadence_core::repository::SqliteRepository;
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod parser;
mod timezone;
mod util;
mod views {
    pub mod table;
}

use commands::AppContext;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = match config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Invalid configuration: {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            handle_error(e.into());
            std::process::exit(1);
        }
    };

    let ctx = AppContext {
        repo: SqliteRepository::new(db_pool.clone()),
        calendar: LocalCalendarProvider::new(db_pool),
        rules: RRuleBuilder::new(),
        user_id: cli.user.unwrap_or_else(|| config.user_id()),
        config,
    };

    let result = match cli.command {
        cli::Commands::Prefs(command) => commands::prefs::prefs_command(&ctx, command).await,
        cli::Commands::Add(command) => commands::add::add_task(&ctx, command).await,
        cli::Commands::List(command) => commands::list::list_tasks(&ctx, command).await,
        cli::Commands::Schedule(command) => {
            commands::schedule::schedule_tasks(&ctx, command).await
        }
        cli::Commands::Edit(command) => commands::edit::edit_task(&ctx, command).await,
        cli::Commands::Delete(command) => commands::delete::delete_task(&ctx, command).await,
        cli::Commands::Occurrences(command) => {
            commands::occurrences::list_occurrences(&ctx, command).await
        }
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    let Some(core_error) = err.downcast_ref::<CoreError>() else {
        eprintln!("{} {}", "Error:".style(error_style), err);
        return;
    };

    match core_error {
        CoreError::NotFound(s) => {
            eprintln!("{} {}", "Error:".style(error_style), s);
        }
        CoreError::InvalidInput(s) => {
            eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
        }
        CoreError::InvalidTimezone(s) => {
            eprintln!("{} Invalid timezone {}", "Error:".style(error_style), s.yellow());
        }
        CoreError::Step { step, source } => {
            eprintln!(
                "{} Stopped at '{}': {}",
                "Error:".style(error_style),
                step.yellow(),
                source
            );
            eprintln!(
                "{}",
                "Steps before this one were already saved."
                    .bright_black()
            );
        }
        CoreError::Calendar(e) => {
            eprintln!("{} Calendar provider: {}", "Error:".style(error_style), e);
        }
        other => {
            // Database and IO errors carry their detail in the source chain
            eprintln!("{} {}", "Error:".style(error_style), other);
            let mut source = std::error::Error::source(other);
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = std::error::Error::source(cause);
            }
        }
    }
}
