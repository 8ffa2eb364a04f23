//! Repository command handlers
//!
//! `add`, `remove` and `init` are forwarded to the running instance, which
//! owns every write to the registry.

use anyhow::{Context, Result, anyhow};
use colored::*;
use std::path::{Path, PathBuf};

use grony_client::{ClientError, CommandResponse, GronyClient, Severity};
use grony_core::paths;

use crate::config::Config;

/// Register the repository at `path`
pub async fn add(path: &str, name: Option<String>, config: &Config) -> Result<()> {
    let path = resolve(path)?;
    let name = match name {
        Some(name) => name,
        None => default_name(&path)?,
    };

    let client = config.client()?;
    send_add(&client, &path, &name, config).await
}

/// Unregister the repository `name`
pub async fn remove(name: &str, config: &Config) -> Result<()> {
    let client = config.client()?;
    let response = client
        .remove(name)
        .await
        .map_err(|e| explain(e, &client, config))?;

    report(&response)
}

/// Create a default `.grony` in `path`, optionally registering it too
pub async fn init(path: &str, and_add: bool, config: &Config) -> Result<()> {
    let path = resolve(path)?;

    let client = config.client()?;
    let response = client
        .init(&path)
        .await
        .map_err(|e| explain(e, &client, config))?;
    report(&response)?;

    if and_add {
        let name = default_name(&path)?;
        send_add(&client, &path, &name, config).await?;
    }

    Ok(())
}

async fn send_add(client: &GronyClient, path: &Path, name: &str, config: &Config) -> Result<()> {
    let response = client
        .add(path, name)
        .await
        .map_err(|e| explain(e, client, config))?;

    report(&response)
}

/// Print every message and fail if any of them is not a success
fn report(response: &CommandResponse) -> Result<()> {
    for message in &response.messages {
        match message.severity {
            Severity::Success => println!("{} {}", "✓".green(), message.message),
            Severity::Error => eprintln!("{} {}", "✗".red(), message.message.red()),
            Severity::Fatal => eprintln!("{} {}", "✗".red().bold(), message.message.red().bold()),
        }
    }

    if response.is_success() {
        Ok(())
    } else {
        Err(anyhow!("command was not applied"))
    }
}

/// Turns transport failures into something a user can act on
fn explain(err: ClientError, client: &GronyClient, config: &Config) -> anyhow::Error {
    if err.is_unreachable() {
        anyhow!(
            "Could not reach grony at {}. Is 'grony start' running with {}?",
            client.base_url(),
            config.dotfile.display()
        )
    } else if err.is_server_error() {
        anyhow!("The server rejected the request; check the secret in {}", config.dotfile.display())
    } else {
        err.into()
    }
}

fn resolve(path: &str) -> Result<PathBuf> {
    paths::resolve_path(path).with_context(|| format!("Invalid path '{}'", path))
}

/// Directory name of `path`, used when no name is given
fn default_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .with_context(|| format!("Cannot derive a name from {}; pass --name", path.display()))
}
