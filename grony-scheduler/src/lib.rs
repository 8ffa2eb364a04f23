//! Grony Scheduler
//!
//! The time-driven half of grony: reads the registry on a fixed cadence,
//! computes when each repository's pull, commit and push are next due and
//! runs them through git.

pub mod clock;
pub mod config;
pub mod executor;
pub mod scheduler;

pub use clock::{Clock, LocalClock};
pub use config::SchedulerConfig;
pub use executor::{ActionExecutor, ExecutionError, GitExecutor};
pub use scheduler::{CronScheduler, SchedulerStats};
