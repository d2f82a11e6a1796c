//! Scheduled task subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle (after the listener accepts)
//!     → TaskSetup::setup(TaskContext), exactly once
//!     → runner.rs spawns one interval loop per task
//!     → tasks.rs built-ins (heartbeat, upload sweeper)
//! ```
//!
//! # Design Decisions
//! - A failing run is logged and counted, never fatal
//! - Missed ticks are skipped, not bunched up
//! - Loops stop on the shared shutdown signal

pub mod runner;
pub mod task;
pub mod tasks;

pub use runner::{Scheduler, SchedulerError, SchedulerHandle, TaskSetup};
pub use task::{ScheduledTask, TaskContext, TaskError};
pub use tasks::{Heartbeat, UploadSweeper};
