//! # Cadence Core Library
//!
//! Task scheduling and recurrence engine: places loose tasks into a user's
//! working hours and applies scoped changes to recurring series while keeping
//! a calendar provider in step.
//!
//! ## Features
//!
//! - **Slot finding**: first-fit placement inside the working window of each
//!   local day, with a bump queue that rolls unplaceable tasks forward
//! - **Scoped series changes**: edit or delete one occurrence, an occurrence
//!   and its successors, or the whole series
//! - **Timezone awareness**: working hours and occurrence dates are evaluated
//!   in the user's IANA zone, DST included
//! - **Provider sync**: calendar failures never roll back relational changes;
//!   they are reported and the affected link is marked for reconciliation
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and request/response types
//! - [`repository`]: Store traits and the SQLite implementation
//! - [`scheduler`]: The [`SlotFinder`](scheduler::SlotFinder)
//! - [`series`]: The [`SeriesManager`](series::SeriesManager)
//! - [`recurrence`]: Rule building and occurrence expansion
//! - [`calendar`]: Calendar provider boundary and the local provider
//! - [`timezone`]: Timezone utilities and validation
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db,
//!     models::{NewTaskData, SchedulerConfig},
//!     repository::{SqliteRepository, TaskStore},
//!     scheduler::SlotFinder,
//! };
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::establish_connection("cadence.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!     let user_id = Uuid::now_v7();
//!
//!     let task = repo
//!         .add_task(NewTaskData {
//!             user_id,
//!             title: "Write report".to_string(),
//!             duration_minutes: Some(90),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let finder = SlotFinder::new(&repo, SchedulerConfig::default());
//!     let scheduled = finder.schedule(vec![task], user_id).await?;
//!     repo.update_task_starts(&scheduled).await?;
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod db;
pub mod error;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod scheduler;
pub mod series;
pub mod timezone;
