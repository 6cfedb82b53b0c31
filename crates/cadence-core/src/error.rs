use thiserror::Error;

use crate::calendar::CalendarError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRRule(String),

    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    #[error("Calendar provider error")]
    Calendar(#[from] CalendarError),

    /// A relational sub-step of a series change failed after earlier steps
    /// were already applied.
    #[error("Step '{step}' failed")]
    Step {
        step: &'static str,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    pub(crate) fn at_step(step: &'static str) -> impl FnOnce(CoreError) -> CoreError {
        move |source| CoreError::Step {
            step,
            source: Box::new(source),
        }
    }
}
