//! Command Service
//!
//! The three registry mutations reachable over the control endpoint. Every
//! operation returns a message on success and a [`CommandError`] otherwise;
//! neither case is an HTTP failure.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use grony_core::RegistryError;
use grony_core::domain::DEFAULT_COMMIT_MESSAGE;
use grony_core::domain::repository::keys;
use grony_core::dto::command::CommandResponse;
use grony_core::paths;
use grony_core::registry::{RegistryStore, create_local_file};

use super::{CommandDispatcher, Params};

/// Commands the control endpoint accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Init,
    Add,
    Remove,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Init => "init",
            Command::Add => "add",
            Command::Remove => "remove",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "init" => Ok(Command::Init),
            "add" => Ok(Command::Add),
            "remove" => Ok(Command::Remove),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

/// Service error type
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Persistence(String),
}

impl From<RegistryError> for CommandError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(msg) => CommandError::Validation(msg),
            RegistryError::Conflict(msg) => CommandError::Conflict(msg),
            other => CommandError::Persistence(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// Settings written to a freshly initialized `.grony` file
const INIT_SETTINGS: [(&str, &str); 7] = [
    (keys::PULL_ON, "@hourly"),
    (keys::COMMIT_ON, "@hourly"),
    (keys::PUSH_ON, "@hourly"),
    (keys::COMMIT_MESSAGE, DEFAULT_COMMIT_MESSAGE),
    (keys::PULL_REMOTE, "origin"),
    (keys::PUSH_REMOTE, "origin"),
    (keys::OVERRIDE_SETTINGS, "false"),
];

/// Executes commands against the registry store
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    store: Arc<RegistryStore>,
}

impl CommandRegistry {
    pub fn new(store: Arc<RegistryStore>) -> Self {
        Self { store }
    }

    /// Creates a default `.grony` file in `path`
    pub fn init(&self, params: &Params) -> Result<String> {
        let raw = required(params, "path")?;
        let path = resolve(raw)?;

        match create_local_file(&paths::local_file(&path), &INIT_SETTINGS) {
            Ok(()) => {}
            Err(RegistryError::Conflict(_)) => {
                return Err(CommandError::Conflict(format!(
                    ".grony file already exists in {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Created default .grony in {}", path.display());

        let mut message = format!("Default .grony created in {}", path.display());
        if !is_git_repo(&path) {
            message.push_str(" but it doesn't look like a git repo");
        }
        Ok(message)
    }

    /// Registers the repository at `path` under `name`
    pub fn add(&self, params: &Params) -> Result<String> {
        let raw = required(params, "path")?;
        let name = required(params, "name")?;
        let path = resolve(raw)?;

        self.store
            .update(|registry| registry.add_repo(name, &path))?;

        tracing::info!("Added repository '{}' at {}", name, path.display());
        Ok(format!("Successfully added {}", name))
    }

    /// Unregisters the repository `name`
    pub fn remove(&self, params: &Params) -> Result<String> {
        let name = required(params, "name")?;

        match self.store.update(|registry| registry.remove_repo(name)) {
            Ok(()) => {}
            Err(RegistryError::Validation(msg)) => return Err(CommandError::Validation(msg)),
            Err(e) => {
                tracing::error!("Failed to remove '{}': {}", name, e);
                return Err(CommandError::Persistence(format!(
                    "Can't remove repo '{}'",
                    name
                )));
            }
        }

        tracing::info!("Removed repository '{}'", name);
        Ok(format!(
            "Repository removed from {}",
            self.store.path().display()
        ))
    }
}

impl CommandDispatcher for CommandRegistry {
    fn dispatch(&self, command: Command, params: &Params) -> CommandResponse {
        let result = match command {
            Command::Init => self.init(params),
            Command::Add => self.add(params),
            Command::Remove => self.remove(params),
        };

        match result {
            Ok(message) => CommandResponse::from_outcome(true, message),
            Err(e) => {
                tracing::debug!("{} rejected: {}", command, e);
                CommandResponse::from_outcome(false, e.to_string())
            }
        }
    }
}

// =============================================================================
// Validation Helpers
// =============================================================================

fn required<'a>(params: &'a Params, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CommandError::Validation(format!("Missing parameter '{}'", key)))
}

fn resolve(raw: &str) -> Result<std::path::PathBuf> {
    paths::resolve_path(raw)
        .map_err(|e| CommandError::Validation(format!("Invalid path '{}': {}", raw, e)))
}

fn is_git_repo(path: &Path) -> bool {
    path.join(".git").is_dir()
}
