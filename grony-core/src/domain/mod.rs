//! Core domain types
//!
//! These types are shared by the scheduler (which reads and executes them)
//! and the control server (which mutates the registry they are loaded from).

pub mod repository;
pub mod run;

pub use repository::{Action, DEFAULT_COMMIT_MESSAGE, RepositoryDefinition};
pub use run::ScheduledRun;
