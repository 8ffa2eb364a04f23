//! Command DTOs
//!
//! Response body returned by the control server for every dispatched command.

use serde::{Deserialize, Serialize};

/// Outcome class of one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Fatal,
}

/// One message in a command response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub severity: Severity,
    pub message: String,
}

/// Response body: `{"messages": [{"severity": ..., "message": ...}]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub messages: Vec<CommandMessage>,
}

impl CommandResponse {
    /// Single-message response for a command result
    pub fn from_outcome(ok: bool, message: impl Into<String>) -> Self {
        let severity = if ok { Severity::Success } else { Severity::Error };
        Self {
            messages: vec![CommandMessage {
                severity,
                message: message.into(),
            }],
        }
    }

    /// Single-message response for a command that could not run to completion
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            messages: vec![CommandMessage {
                severity: Severity::Fatal,
                message: message.into(),
            }],
        }
    }

    /// True when there is at least one message and none of them failed
    pub fn is_success(&self) -> bool {
        !self.messages.is_empty()
            && self
                .messages
                .iter()
                .all(|m| m.severity == Severity::Success)
    }
}
