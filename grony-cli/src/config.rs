//! Configuration module
//!
//! Locates the registry file and builds the handles commands work with.

use anyhow::{Context, Result};
use std::path::PathBuf;

use grony_client::GronyClient;
use grony_core::registry::RegistryStore;

/// File name of the registry in the user's home directory
pub const DEFAULT_DOTFILE: &str = ".grony.conf";

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Central registry file
    pub dotfile: PathBuf,
}

impl Config {
    /// Uses `dotfile` if given, else `~/.grony.conf`
    pub fn new(dotfile: Option<PathBuf>) -> Result<Self> {
        let dotfile = match dotfile {
            Some(path) => path,
            None => default_dotfile()?,
        };
        Ok(Self { dotfile })
    }

    pub fn store(&self) -> RegistryStore {
        RegistryStore::new(&self.dotfile)
    }

    /// Client for the control server of the running instance
    pub fn client(&self) -> Result<GronyClient> {
        let registry = self
            .store()
            .load()
            .with_context(|| format!("Failed to read {}", self.dotfile.display()))?;

        Ok(GronyClient::from_config(registry.config())?)
    }
}

fn default_dotfile() -> Result<PathBuf> {
    let home = home::home_dir().context("Could not determine the home directory")?;
    Ok(home.join(DEFAULT_DOTFILE))
}
