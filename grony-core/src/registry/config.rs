//! Control-plane settings stored in the `[config]` section

use crate::error::ConfigError;
use crate::ini::Section;

/// Name of the section holding control-plane settings
pub const CONFIG_SECTION: &str = "config";

/// Port the control server listens on when none is configured
pub const DEFAULT_IPC_PORT: u16 = 62830;

pub const IPC_PORT_KEY: &str = "ipc_port";
pub const SECRET_KEY: &str = "secret";

/// Typed view of the `[config]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlConfig {
    pub ipc_port: u16,
    /// Bearer secret. Absent only until the registry is first initialised.
    pub secret: Option<String>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            ipc_port: DEFAULT_IPC_PORT,
            secret: None,
        }
    }
}

impl ControlConfig {
    pub fn from_section(section: Option<&Section>) -> Result<Self, ConfigError> {
        let Some(section) = section else {
            return Ok(Self::default());
        };

        let ipc_port = match section.get(IPC_PORT_KEY) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or_else(|| ConfigError::InvalidPort(raw.to_string()))?,
            None => DEFAULT_IPC_PORT,
        };

        let secret = section
            .get(SECRET_KEY)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self { ipc_port, secret })
    }

    /// Base URL of the control server
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.ipc_port)
    }
}
