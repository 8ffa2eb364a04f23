//! Scheduler layer
//!
//! Holds the cron-driven loop that turns registry entries into scheduled runs
//! and hands due runs to an [`ActionExecutor`](crate::executor::ActionExecutor).

pub mod cron_scheduler;

pub use cron_scheduler::{CronScheduler, SchedulerStats, TickReport, schedule_runs};
