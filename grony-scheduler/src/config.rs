//! Scheduler configuration
//!
//! Defines the reload cadence, the loop tick and the optional execution
//! timeout for git actions.

use std::time::Duration;

/// Default interval between registry reloads
pub const DEFAULT_RELOAD_DELAY: Duration = Duration::from_secs(5);

/// Default sleep between loop iterations
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Scheduler configuration
///
/// `reload_delay` bounds how stale the scheduler's view of the registry can
/// be: a mutation accepted by the control server is picked up at most one
/// reload delay later.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the registry is re-read from disk
    pub reload_delay: Duration,

    /// Sleep between loop iterations; also bounds shutdown latency
    pub tick_interval: Duration,

    /// Maximum time a single git action may run. `None` waits forever.
    pub exec_timeout: Option<Duration>,
}

impl SchedulerConfig {
    /// Creates a configuration with the given reload delay and default tick
    pub fn new(reload_delay: Duration) -> Self {
        Self {
            reload_delay,
            tick_interval: DEFAULT_TICK_INTERVAL,
            exec_timeout: None,
        }
    }

    /// Sets a per-action execution timeout
    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = Some(timeout);
        self
    }

    /// Sets the loop tick interval
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.reload_delay.is_zero() {
            anyhow::bail!("reload_delay must be greater than 0");
        }

        if self.tick_interval.is_zero() {
            anyhow::bail!("tick_interval must be greater than 0");
        }

        if self.tick_interval > Duration::from_secs(1) {
            anyhow::bail!("tick_interval must not exceed one second");
        }

        if self.exec_timeout.is_some_and(|t| t.is_zero()) {
            anyhow::bail!("exec_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_RELOAD_DELAY)
    }
}
