//! Cron scheduler
//!
//! One long-lived loop: reload the registry every `reload_delay`, compute a
//! batch of scheduled runs, execute whatever is due and recompute the batch.
//! Each run executes in its own task so a panicking executor only fails that
//! run.

use chrono::{NaiveDateTime, TimeDelta};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info, warn};

use grony_core::cron::truncate_to_minute;
use grony_core::domain::{Action, RepositoryDefinition, ScheduledRun};
use grony_core::registry::{Registry, RegistryStore};

use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::executor::ActionExecutor;

/// Cumulative counters since the scheduler started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub reloads: u64,
    pub runs_attempted: u64,
    pub runs_failed: u64,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub reloaded: bool,
    pub attempted: usize,
    pub failed: usize,
}

/// Computes the next run of every configured action.
///
/// Each run is due at the first matching minute strictly after `since`'s
/// minute. Actions without an expression are skipped.
pub fn schedule_runs<'a>(
    repositories: impl IntoIterator<Item = &'a RepositoryDefinition>,
    since: NaiveDateTime,
) -> Vec<ScheduledRun> {
    let from = truncate_to_minute(since) + TimeDelta::minutes(1);
    let mut runs = Vec::new();

    for repository in repositories {
        debug!("Checking actions for '{}'", repository.name);
        let snapshot = Arc::new(repository.clone());

        for action in Action::ALL {
            let Some(expr) = repository.schedule_for(action) else {
                continue;
            };

            match expr.next_from(from) {
                Some(due_at) => {
                    debug!("  - {} scheduled on {}", action, due_at);
                    runs.push(ScheduledRun {
                        due_at,
                        action,
                        repository: Arc::clone(&snapshot),
                    });
                }
                None => warn!(
                    "'{}' for {} on '{}' never matches",
                    expr, action, repository.name
                ),
            }
        }
    }

    runs
}

/// Scheduler that drives git actions from cron expressions
pub struct CronScheduler {
    config: SchedulerConfig,
    store: Arc<RegistryStore>,
    executor: Arc<dyn ActionExecutor>,
    clock: Arc<dyn Clock>,
    reload_delay: TimeDelta,

    /// Last successfully loaded registry
    registry: Option<Registry>,
    next_reload: Option<NaiveDateTime>,
    runs: Option<Vec<ScheduledRun>>,
    /// Reference time of the current batch
    basis: Option<NaiveDateTime>,
    /// `now` of the previous tick
    horizon: Option<NaiveDateTime>,
    stats: SchedulerStats,
}

impl CronScheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<RegistryStore>,
        executor: Arc<dyn ActionExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let reload_delay =
            TimeDelta::from_std(config.reload_delay).unwrap_or(TimeDelta::seconds(5));

        Self {
            config,
            store,
            executor,
            clock,
            reload_delay,
            registry: None,
            next_reload: None,
            runs: None,
            basis: None,
            horizon: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Runs of the current batch, empty before the first tick
    pub fn pending_runs(&self) -> &[ScheduledRun] {
        self.runs.as_deref().unwrap_or(&[])
    }

    /// Reference time the current batch was computed from
    pub fn schedule_basis(&self) -> Option<NaiveDateTime> {
        self.basis
    }

    /// Runs the loop until `shutdown` turns true or its sender is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SchedulerStats {
        info!(
            "Starting scheduler (registry: {}, reload delay: {:?})",
            self.store.path().display(),
            self.config.reload_delay
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.tick().await;

            // A dropped sender also stops the loop
            let closed = tokio::select! {
                changed = shutdown.changed() => changed.is_err(),
                _ = time::sleep(self.config.tick_interval) => false,
            };
            if closed {
                break;
            }
        }

        info!(
            "Scheduler stopped after {} runs ({} failed)",
            self.stats.runs_attempted, self.stats.runs_failed
        );
        self.stats
    }

    /// Performs one iteration of the loop
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        self.stats.ticks += 1;

        let now = self.clock.now();
        let horizon = *self.horizon.get_or_insert(now);

        if self.next_reload.is_none_or(|at| now >= at) {
            self.reload(now);
            report.reloaded = true;
        }

        if self.runs.is_none() {
            self.reschedule(horizon);
        }

        let due: Vec<ScheduledRun> = self
            .pending_runs()
            .iter()
            .filter(|run| run.is_due(now))
            .cloned()
            .collect();

        for run in due {
            report.attempted += 1;
            if !self.perform(run).await {
                report.failed += 1;
            }
        }

        if report.attempted > 0 {
            self.stats.runs_attempted += report.attempted as u64;
            self.stats.runs_failed += report.failed as u64;

            info!("Executed {} pending runs", report.attempted);
            if report.failed > 0 {
                warn!("  - {} errors", report.failed);
            }

            self.reschedule(now);
        }

        self.horizon = Some(now);
        report
    }

    /// Re-reads the registry. On failure the previous snapshot stays active.
    fn reload(&mut self, now: NaiveDateTime) {
        debug!("Reloading registry {}", self.store.path().display());
        self.stats.reloads += 1;

        match self.store.load() {
            Ok(registry) => self.registry = Some(registry),
            Err(e) => warn!("Failed to reload registry, keeping previous: {}", e),
        }

        self.next_reload = Some(
            now.checked_add_signed(self.reload_delay)
                .unwrap_or(NaiveDateTime::MAX),
        );
        self.runs = None;
    }

    fn reschedule(&mut self, since: NaiveDateTime) {
        let runs = match &self.registry {
            Some(registry) => schedule_runs(registry.repositories(), since),
            None => Vec::new(),
        };

        debug!("Scheduled {} runs from {}", runs.len(), since);
        self.basis = Some(since);
        self.runs = Some(runs);
    }

    /// Executes one run in its own task
    async fn perform(&self, run: ScheduledRun) -> bool {
        let executor = Arc::clone(&self.executor);
        let action = run.action;
        let name = run.repository.name.clone();

        let handle =
            tokio::spawn(async move { executor.execute(run.action, &run.repository).await });

        match handle.await {
            Ok(succeeded) => succeeded,
            Err(e) => {
                error!("{} on '{}' panicked: {}", action, name, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::manual::ManualClock;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Panic,
    }

    struct RecordingExecutor {
        behavior: Behavior,
        calls: Mutex<Vec<(Action, String)>>,
        /// Moves the clock forward during each execution
        clock: Option<(Arc<ManualClock>, TimeDelta)>,
    }

    impl RecordingExecutor {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: Mutex::new(Vec::new()),
                clock: None,
            }
        }

        fn calls(&self) -> Vec<(Action, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActionExecutor for RecordingExecutor {
        async fn execute(&self, action: Action, repository: &RepositoryDefinition) -> bool {
            self.calls
                .lock()
                .unwrap()
                .push((action, repository.name.clone()));
            if let Some((clock, delta)) = &self.clock {
                clock.advance(*delta);
            }
            match self.behavior {
                Behavior::Succeed => true,
                Behavior::Fail => false,
                Behavior::Panic => panic!("executor blew up"),
            }
        }
    }

    struct Fixture {
        _dir: TempDir,
        registry_path: std::path::PathBuf,
        repo_dir: std::path::PathBuf,
        store: Arc<RegistryStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let registry_path = dir.path().join("grony.conf");
            let repo_dir = dir.path().join("r1");
            std::fs::create_dir(&repo_dir).unwrap();
            let store = Arc::new(RegistryStore::new(&registry_path));
            Self {
                _dir: dir,
                registry_path,
                repo_dir,
                store,
            }
        }

        fn write(&self, repos: &[(&str, &str)]) {
            let mut text = String::from("[config]\nsecret = abc\n");
            for (name, commit_on) in repos {
                text.push_str(&format!(
                    "\n[repo '{}']\npath = {}\ncommit-on = {}\n",
                    name,
                    self.repo_dir.display(),
                    commit_on
                ));
            }
            std::fs::write(&self.registry_path, text).unwrap();
        }

        fn scheduler(
            &self,
            executor: Arc<RecordingExecutor>,
            clock: Arc<ManualClock>,
        ) -> CronScheduler {
            CronScheduler::new(
                SchedulerConfig::default(),
                Arc::clone(&self.store),
                executor,
                clock,
            )
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn repository(settings: &[(&str, &str)]) -> RepositoryDefinition {
        let settings: std::collections::BTreeMap<String, String> = settings
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RepositoryDefinition::from_settings("r1", &settings).unwrap()
    }

    #[test]
    fn test_hourly_commit_after_reload() {
        let repo = repository(&[("path", "/tmp/r1"), ("commit-on", "@hourly")]);
        let runs = schedule_runs([&repo], at("2024-01-01 10:00:00"));

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].action, Action::Commit);
        assert_eq!(runs[0].due_at, at("2024-01-01 11:00:00"));
    }

    #[test]
    fn test_actions_without_expression_are_skipped() {
        let repo = repository(&[("path", "/tmp/r1")]);
        assert!(schedule_runs([&repo], at("2024-01-01 10:00:00")).is_empty());

        let repo = repository(&[
            ("path", "/tmp/r1"),
            ("pull-on", "*/5 * * * *"),
            ("push-on", "0 18 * * *"),
        ]);
        let runs = schedule_runs([&repo], at("2024-01-01 10:02:30"));
        let actions: Vec<Action> = runs.iter().map(|r| r.action).collect();
        assert_eq!(actions, vec![Action::Pull, Action::Push]);
        assert_eq!(runs[0].due_at, at("2024-01-01 10:05:00"));
        assert_eq!(runs[1].due_at, at("2024-01-01 18:00:00"));
    }

    #[test]
    fn test_matching_minute_of_since_is_not_rescheduled() {
        let repo = repository(&[("path", "/tmp/r1"), ("commit-on", "* * * * *")]);
        let runs = schedule_runs([&repo], at("2024-01-01 10:00:45"));
        assert_eq!(runs[0].due_at, at("2024-01-01 10:01:00"));
    }

    #[tokio::test]
    async fn test_first_tick_schedules_without_executing() {
        let fixture = Fixture::new();
        fixture.write(&[("r1", "@hourly")]);

        let executor = Arc::new(RecordingExecutor::new(Behavior::Succeed));
        let clock = Arc::new(ManualClock::at("2024-01-01 10:00:00"));
        let mut scheduler = fixture.scheduler(executor.clone(), clock);

        let report = scheduler.tick().await;
        assert!(report.reloaded);
        assert_eq!(report.attempted, 0);

        let runs = scheduler.pending_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].action, Action::Commit);
        assert_eq!(runs[0].due_at, at("2024-01-01 11:00:00"));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reschedule_uses_pre_execution_time() {
        let fixture = Fixture::new();
        fixture.write(&[("r1", "*/2 * * * *")]);

        let clock = Arc::new(ManualClock::at("2024-01-01 10:59:30"));
        let mut executor = RecordingExecutor::new(Behavior::Succeed);
        executor.clock = Some((clock.clone(), TimeDelta::minutes(3)));
        let executor = Arc::new(executor);
        let mut scheduler = fixture.scheduler(executor.clone(), clock.clone());

        scheduler.tick().await;
        assert_eq!(scheduler.pending_runs()[0].due_at, at("2024-01-01 11:00:00"));

        clock.set("2024-01-01 11:00:05");
        let report = scheduler.tick().await;
        assert_eq!(report.attempted, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(executor.calls(), vec![(Action::Commit, "r1".to_string())]);

        // The executor took three minutes, but the batch is based on 11:00:05
        assert_eq!(scheduler.schedule_basis(), Some(at("2024-01-01 11:00:05")));
        assert_eq!(scheduler.pending_runs()[0].due_at, at("2024-01-01 11:02:00"));
    }

    #[tokio::test]
    async fn test_reload_between_ticks_keeps_due_minute() {
        let fixture = Fixture::new();
        fixture.write(&[("r1", "@hourly")]);

        let executor = Arc::new(RecordingExecutor::new(Behavior::Succeed));
        let clock = Arc::new(ManualClock::at("2024-01-01 10:59:59"));
        let mut scheduler = fixture.scheduler(executor.clone(), clock.clone());
        scheduler.tick().await;

        // Reload is due on the same tick the 11:00 run becomes due
        clock.set("2024-01-01 11:00:06");
        let report = scheduler.tick().await;
        assert!(report.reloaded);
        assert_eq!(report.attempted, 1);
        assert_eq!(scheduler.pending_runs()[0].due_at, at("2024-01-01 12:00:00"));
    }

    #[tokio::test]
    async fn test_registry_edits_are_picked_up_at_reload() {
        let fixture = Fixture::new();
        fixture.write(&[("r1", "@hourly")]);

        let executor = Arc::new(RecordingExecutor::new(Behavior::Succeed));
        let clock = Arc::new(ManualClock::at("2024-01-01 10:00:00"));
        let mut scheduler = fixture.scheduler(executor, clock.clone());
        scheduler.tick().await;

        fixture.write(&[("r1", "@hourly"), ("r2", "@daily")]);

        clock.advance(TimeDelta::seconds(2));
        let report = scheduler.tick().await;
        assert!(!report.reloaded);
        assert_eq!(scheduler.pending_runs().len(), 1);

        clock.advance(TimeDelta::seconds(4));
        let report = scheduler.tick().await;
        assert!(report.reloaded);
        assert_eq!(scheduler.pending_runs().len(), 2);
        assert_eq!(scheduler.stats().reloads, 2);
    }

    #[tokio::test]
    async fn test_removed_repository_stops_running() {
        let fixture = Fixture::new();
        fixture.write(&[("r1", "* * * * *")]);

        let executor = Arc::new(RecordingExecutor::new(Behavior::Succeed));
        let clock = Arc::new(ManualClock::at("2024-01-01 10:00:00"));
        let mut scheduler = fixture.scheduler(executor.clone(), clock.clone());
        scheduler.tick().await;

        fixture
            .store
            .update(|registry| registry.remove_repo("r1"))
            .unwrap();

        clock.set("2024-01-01 10:01:00");
        let report = scheduler.tick().await;
        assert_eq!(report.attempted, 0);
        assert!(scheduler.pending_runs().is_empty());
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_snapshot() {
        let fixture = Fixture::new();
        fixture.write(&[("r1", "@hourly")]);

        let executor = Arc::new(RecordingExecutor::new(Behavior::Succeed));
        let clock = Arc::new(ManualClock::at("2024-01-01 10:00:00"));
        let mut scheduler = fixture.scheduler(executor, clock.clone());
        scheduler.tick().await;

        std::fs::write(&fixture.registry_path, "not an ini file\n").unwrap();

        clock.advance(TimeDelta::seconds(6));
        let report = scheduler.tick().await;
        assert!(report.reloaded);
        assert_eq!(scheduler.pending_runs().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_counted_and_loop_continues() {
        let fixture = Fixture::new();
        fixture.write(&[("r1", "* * * * *")]);

        let executor = Arc::new(RecordingExecutor::new(Behavior::Fail));
        let clock = Arc::new(ManualClock::at("2024-01-01 10:00:00"));
        let mut scheduler = fixture.scheduler(executor.clone(), clock.clone());
        scheduler.tick().await;

        clock.set("2024-01-01 10:01:00");
        let report = scheduler.tick().await;
        assert_eq!((report.attempted, report.failed), (1, 1));

        clock.set("2024-01-01 10:02:00");
        let report = scheduler.tick().await;
        assert_eq!((report.attempted, report.failed), (1, 1));

        let stats = scheduler.stats();
        assert_eq!(stats.runs_attempted, 2);
        assert_eq!(stats.runs_failed, 2);
        assert_eq!(stats.ticks, 3);
    }

    #[tokio::test]
    async fn test_panicking_executor_is_contained() {
        let fixture = Fixture::new();
        fixture.write(&[("r1", "* * * * *")]);

        let executor = Arc::new(RecordingExecutor::new(Behavior::Panic));
        let clock = Arc::new(ManualClock::at("2024-01-01 10:00:00"));
        let mut scheduler = fixture.scheduler(executor.clone(), clock.clone());
        scheduler.tick().await;

        clock.set("2024-01-01 10:01:00");
        let report = scheduler.tick().await;
        assert_eq!((report.attempted, report.failed), (1, 1));
        assert_eq!(scheduler.pending_runs()[0].due_at, at("2024-01-01 10:02:00"));
    }

    #[tokio::test]
    async fn test_missing_registry_schedules_nothing() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RegistryStore::new(dir.path().join("absent.conf")));
        let mut scheduler = CronScheduler::new(
            SchedulerConfig::default(),
            store,
            Arc::new(RecordingExecutor::new(Behavior::Succeed)),
            Arc::new(ManualClock::at("2024-01-01 10:00:00")),
        );

        scheduler.tick().await;
        assert!(scheduler.pending_runs().is_empty());
        assert!(!dir.path().join("absent.conf").exists());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let fixture = Fixture::new();
        fixture.write(&[]);

        let scheduler = CronScheduler::new(
            SchedulerConfig::default().with_tick_interval(Duration::from_millis(20)),
            Arc::clone(&fixture.store),
            Arc::new(RecordingExecutor::new(Behavior::Succeed)),
            Arc::new(ManualClock::at("2024-01-01 10:00:00")),
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(rx));

        time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let stats = time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
        assert!(stats.ticks >= 1);
    }
}
