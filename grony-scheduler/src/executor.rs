//! Git action execution
//!
//! Runs pull, commit and push against a repository working tree by invoking
//! the `git` binary directly (no shell). Every action reports a plain
//! success flag to the scheduler; failures are logged here and never
//! propagate as errors.

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info};

use grony_core::domain::{Action, RepositoryDefinition};

/// Errors raised while running a git action
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("repository path {} does not exist", .0.display())]
    MissingPath(PathBuf),

    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("'{command}' timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

/// Performs one action against one repository
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Returns true if the action succeeded
    async fn execute(&self, action: Action, repository: &RepositoryDefinition) -> bool;
}

/// How an action that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    /// Commit found a clean working tree and did nothing
    NothingToCommit,
}

/// Checks if git is installed and available
pub fn check_git_available() -> anyhow::Result<String> {
    let output = std::process::Command::new("git")
        .arg("--version")
        .output()
        .map_err(|e| anyhow::anyhow!("Failed to execute 'git --version'. Is git installed? {}", e))?;

    if !output.status.success() {
        anyhow::bail!("git is not working correctly");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// [`ActionExecutor`] backed by the `git` command line
#[derive(Debug, Clone)]
pub struct GitExecutor {
    program: String,
    timeout: Option<Duration>,
}

impl GitExecutor {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            program: "git".to_string(),
            timeout,
        }
    }

    /// Runs `action` and reports how it ended
    pub async fn run_action(
        &self,
        action: Action,
        repository: &RepositoryDefinition,
    ) -> Result<ActionOutcome, ExecutionError> {
        let dir = repository.path.as_path();
        if !dir.is_dir() {
            return Err(ExecutionError::MissingPath(dir.to_path_buf()));
        }

        match action {
            Action::Pull => {
                self.git(dir, &with_remote("pull", &repository.pull_remote))
                    .await?;
                Ok(ActionOutcome::Completed)
            }
            Action::Commit => {
                let status = self.git(dir, &["status", "--porcelain"]).await?;
                if status.trim().is_empty() {
                    return Ok(ActionOutcome::NothingToCommit);
                }

                let message = format_commit_message(&repository.commit_message, Local::now());
                self.git(dir, &["add", "-A"]).await?;
                self.git(dir, &["commit", "-m", message.as_str()]).await?;
                Ok(ActionOutcome::Completed)
            }
            Action::Push => {
                self.git(dir, &with_remote("push", &repository.push_remote))
                    .await?;
                Ok(ActionOutcome::Completed)
            }
        }
    }

    /// Runs git with `args` inside `dir` and returns its stdout
    async fn git(&self, dir: &Path, args: &[&str]) -> Result<String, ExecutionError> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!("Executing '{}' in {}", command, dir.display());

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let child = cmd.output();

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child)
                .await
                .map_err(|_| ExecutionError::TimedOut {
                    command: command.clone(),
                    timeout,
                })?,
            None => child.await,
        }
        .map_err(|source| ExecutionError::Spawn {
            command: command.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !stdout.trim().is_empty() {
            debug!("{}", stdout.trim());
        }

        if !output.status.success() {
            return Err(ExecutionError::Failed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(stdout)
    }
}

impl Default for GitExecutor {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl ActionExecutor for GitExecutor {
    async fn execute(&self, action: Action, repository: &RepositoryDefinition) -> bool {
        info!("Running {} on '{}'...", action, repository.name);

        match self.run_action(action, repository).await {
            Ok(ActionOutcome::Completed) => {
                info!("Finished {} on '{}'", action, repository.name);
                true
            }
            Ok(ActionOutcome::NothingToCommit) => {
                info!("Nothing to commit in '{}'", repository.name);
                true
            }
            Err(e) => {
                error!("{} on '{}' failed: {}", action, repository.name, e);
                false
            }
        }
    }
}

fn with_remote<'a>(verb: &'a str, remote: &'a str) -> Vec<&'a str> {
    if remote.trim().is_empty() {
        vec![verb]
    } else {
        vec![verb, remote.trim()]
    }
}

/// Expands strftime directives in `template` against `now`.
///
/// A template chrono cannot parse is used literally.
pub fn format_commit_message(template: &str, now: DateTime<Local>) -> String {
    let items: Vec<Item> = StrftimeItems::new(template).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return template.to_string();
    }

    let mut message = String::new();
    if write!(message, "{}", now.format_with_items(items.into_iter())).is_err() {
        return template.to_string();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use grony_core::domain::DEFAULT_COMMIT_MESSAGE;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
    }

    fn repository(path: &Path) -> RepositoryDefinition {
        let settings: BTreeMap<String, String> =
            [("path".to_string(), path.display().to_string())].into();
        RepositoryDefinition::from_settings("test", &settings).unwrap()
    }

    fn git_available() -> bool {
        which::which("git").is_ok()
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "-q"]);
        git(dir, &["config", "user.email", "grony@example.com"]);
        git(dir, &["config", "user.name", "grony"]);
        git(dir, &["config", "commit.gpgsign", "false"]);
    }

    fn commit_count(dir: &Path) -> usize {
        let output = std::process::Command::new("git")
            .args(["rev-list", "--count", "HEAD"])
            .current_dir(dir)
            .output()
            .unwrap();
        String::from_utf8_lossy(&output.stdout).trim().parse().unwrap_or(0)
    }

    #[test]
    fn test_default_commit_message() {
        assert_eq!(
            format_commit_message(DEFAULT_COMMIT_MESSAGE, fixed_time()),
            "Auto commit at 20240305 14:07:09"
        );
    }

    #[test]
    fn test_plain_commit_message() {
        assert_eq!(
            format_commit_message("nightly backup", fixed_time()),
            "nightly backup"
        );
    }

    #[test]
    fn test_invalid_template_is_used_literally() {
        assert_eq!(format_commit_message("broken %", fixed_time()), "broken %");
    }

    #[test]
    fn test_with_remote() {
        assert_eq!(with_remote("pull", ""), vec!["pull"]);
        assert_eq!(with_remote("push", "origin"), vec!["push", "origin"]);
    }

    #[tokio::test]
    async fn test_missing_path_fails() {
        let dir = TempDir::new().unwrap();
        let repo = repository(&dir.path().join("gone"));

        let executor = GitExecutor::default();
        let err = executor.run_action(Action::Pull, &repo).await.unwrap_err();
        assert!(matches!(err, ExecutionError::MissingPath(_)));
        assert!(!executor.execute(Action::Pull, &repo).await);
    }

    #[tokio::test]
    async fn test_commit_records_changes() {
        if !git_available() {
            return;
        }

        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();

        let executor = GitExecutor::new(Some(Duration::from_secs(30)));
        let repo = repository(dir.path());

        let outcome = executor.run_action(Action::Commit, &repo).await.unwrap();
        assert_eq!(outcome, ActionOutcome::Completed);
        assert_eq!(commit_count(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_commit_on_clean_tree_is_a_noop() {
        if !git_available() {
            return;
        }

        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();

        let executor = GitExecutor::default();
        let repo = repository(dir.path());
        executor.run_action(Action::Commit, &repo).await.unwrap();

        let outcome = executor.run_action(Action::Commit, &repo).await.unwrap();
        assert_eq!(outcome, ActionOutcome::NothingToCommit);
        assert!(executor.execute(Action::Commit, &repo).await);
        assert_eq!(commit_count(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_pull_without_remote_fails() {
        if !git_available() {
            return;
        }

        let dir = TempDir::new().unwrap();
        init_repo(dir.path());

        let mut repo = repository(dir.path());
        repo.pull_remote = "nowhere".to_string();

        let err = GitExecutor::default()
            .run_action(Action::Pull, &repo)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Failed { .. }));
    }
}
