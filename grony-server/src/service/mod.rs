//! Service layer
//!
//! Business logic behind the control endpoints. Handlers never touch the
//! registry directly; they go through a [`CommandDispatcher`].

pub mod commands;

pub use commands::{Command, CommandError, CommandRegistry};

use grony_core::dto::command::CommandResponse;
use std::collections::HashMap;

/// Decoded request parameters. Only the first value of a repeated key is kept.
pub type Params = HashMap<String, String>;

/// Runs a decoded command. Called on the blocking pool.
pub trait CommandDispatcher: Send + Sync {
    fn dispatch(&self, command: Command, params: &Params) -> CommandResponse;
}
