//! Repository domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cron::CronExpr;
use crate::error::ConfigError;

/// Commit message template used when none is configured
pub const DEFAULT_COMMIT_MESSAGE: &str = "Auto commit at %Y%m%d %H:%M:%S";

/// Setting keys understood in `[repo]` sections
pub mod keys {
    pub const PATH: &str = "path";
    pub const PULL_ON: &str = "pull-on";
    pub const COMMIT_ON: &str = "commit-on";
    pub const PUSH_ON: &str = "push-on";
    pub const COMMIT_MESSAGE: &str = "commit-message";
    pub const PULL_REMOTE: &str = "pull-remote";
    pub const PUSH_REMOTE: &str = "push-remote";
    pub const OVERRIDE_SETTINGS: &str = "override-settings";
}

/// One of the git actions grony can schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Pull,
    Commit,
    Push,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Pull, Action::Commit, Action::Push];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Pull => "pull",
            Action::Commit => "commit",
            Action::Push => "push",
        }
    }

    /// Key holding this action's cron expression
    pub fn schedule_key(&self) -> &'static str {
        match self {
            Action::Pull => keys::PULL_ON,
            Action::Commit => keys::COMMIT_ON,
            Action::Push => keys::PUSH_ON,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pull" => Ok(Action::Pull),
            "commit" => Ok(Action::Commit),
            "push" => Ok(Action::Push),
            other => Err(format!("invalid action '{}'", other)),
        }
    }
}

/// Effective settings of one managed repository
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryDefinition {
    pub name: String,
    pub path: PathBuf,
    pub pull_on: Option<CronExpr>,
    pub commit_on: Option<CronExpr>,
    pub push_on: Option<CronExpr>,
    pub commit_message: String,
    /// Empty means the default remote
    pub pull_remote: String,
    /// Empty means the default remote
    pub push_remote: String,
    pub override_settings: bool,
}

impl RepositoryDefinition {
    /// Builds a definition from merged string settings
    pub fn from_settings(
        name: &str,
        settings: &BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| settings.get(key).map(|v| v.trim()).unwrap_or("");

        let path = get(keys::PATH);
        if path.is_empty() {
            return Err(ConfigError::MissingKey(keys::PATH.to_string()));
        }

        let commit_message = match get(keys::COMMIT_MESSAGE) {
            "" => DEFAULT_COMMIT_MESSAGE.to_string(),
            message => message.to_string(),
        };

        let override_settings = match settings.get(keys::OVERRIDE_SETTINGS) {
            Some(raw) => parse_bool(keys::OVERRIDE_SETTINGS, raw)?,
            None => false,
        };

        Ok(Self {
            name: name.to_string(),
            path: crate::paths::resolve_path(path).unwrap_or_else(|_| PathBuf::from(path)),
            pull_on: parse_schedule(keys::PULL_ON, get(keys::PULL_ON))?,
            commit_on: parse_schedule(keys::COMMIT_ON, get(keys::COMMIT_ON))?,
            push_on: parse_schedule(keys::PUSH_ON, get(keys::PUSH_ON))?,
            commit_message,
            pull_remote: get(keys::PULL_REMOTE).to_string(),
            push_remote: get(keys::PUSH_REMOTE).to_string(),
            override_settings,
        })
    }

    /// Cron expression configured for `action`, if any
    pub fn schedule_for(&self, action: Action) -> Option<&CronExpr> {
        match action {
            Action::Pull => self.pull_on.as_ref(),
            Action::Commit => self.commit_on.as_ref(),
            Action::Push => self.push_on.as_ref(),
        }
    }

    /// Effective settings as key/value pairs, in a stable order
    pub fn settings(&self) -> Vec<(&'static str, String)> {
        let schedule = |expr: &Option<CronExpr>| {
            expr.as_ref().map(|e| e.to_string()).unwrap_or_default()
        };

        vec![
            ("name", self.name.clone()),
            (keys::PATH, self.path.display().to_string()),
            (keys::PULL_ON, schedule(&self.pull_on)),
            (keys::COMMIT_ON, schedule(&self.commit_on)),
            (keys::PUSH_ON, schedule(&self.push_on)),
            (keys::COMMIT_MESSAGE, self.commit_message.clone()),
            (keys::PULL_REMOTE, self.pull_remote.clone()),
            (keys::PUSH_REMOTE, self.push_remote.clone()),
            (keys::OVERRIDE_SETTINGS, self.override_settings.to_string()),
        ]
    }
}

fn parse_schedule(key: &str, raw: &str) -> Result<Option<CronExpr>, ConfigError> {
    if raw.is_empty() {
        return Ok(None);
    }

    CronExpr::parse(raw)
        .map(Some)
        .map_err(|e| ConfigError::InvalidCron {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

/// Parses the boolean spellings accepted in settings files
pub fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}
