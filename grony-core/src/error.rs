//! Error types shared across grony crates
//!
//! Each variant family maps to one failure domain: typed settings that do not
//! parse, mutations that are rejected, and persistence that cannot complete.

use std::path::PathBuf;
use thiserror::Error;

/// A setting could not be converted into its typed representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A cron expression failed to parse
    #[error("invalid cron expression for '{key}': {reason}")]
    InvalidCron { key: String, reason: String },

    /// A boolean flag had an unrecognised value
    #[error("invalid boolean for '{key}': '{value}'")]
    InvalidBool { key: String, value: String },

    /// The control-plane port is not a valid TCP port
    #[error("invalid ipc_port '{0}'")]
    InvalidPort(String),

    /// A required key is missing
    #[error("missing required key '{0}'")]
    MissingKey(String),

    /// The file could not be parsed at all
    #[error("syntax error at line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    /// A repository's `.grony` file exists but is unusable
    #[error("unreadable local file {path}: {reason}")]
    LocalFile { path: PathBuf, reason: String },
}

/// Errors raised by the registry store
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Missing or empty required input
    #[error("{0}")]
    Validation(String),

    /// The mutation collides with existing state
    #[error("{0}")]
    Conflict(String),

    /// The registry could not be written back
    #[error("failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The registry file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The registry content is not valid
    #[error("invalid registry {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
