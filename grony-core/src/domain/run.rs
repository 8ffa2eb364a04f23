//! Scheduled run domain type

use chrono::NaiveDateTime;
use std::sync::Arc;

use super::repository::{Action, RepositoryDefinition};

/// One pending action instance
///
/// The repository is a snapshot taken when the batch was computed, so a
/// registry reload never changes a run that is already scheduled.
#[derive(Debug, Clone)]
pub struct ScheduledRun {
    /// Minute-aligned local time the run becomes due
    pub due_at: NaiveDateTime,
    pub action: Action,
    pub repository: Arc<RepositoryDefinition>,
}

impl ScheduledRun {
    /// Returns true once `now` has reached the due time
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.due_at <= now
    }
}
