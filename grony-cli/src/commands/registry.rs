//! Registry inspection
//!
//! `list` and `show` read the registry file directly and work whether or not
//! an instance is running.

use anyhow::{Context, Result, bail};
use colored::*;

use grony_core::domain::{Action, RepositoryDefinition};
use grony_core::ini::IniDocument;
use grony_core::registry::{Registry, section_name};

use crate::config::Config;

/// List every registered repository
pub fn list(config: &Config) -> Result<()> {
    let registry = load(config)?;

    if registry.is_empty() {
        println!("{}", "No repositories registered.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("Found {} repositories:", registry.len()).bold()
    );
    println!();

    for name in registry.repo_names() {
        match registry.repository(name) {
            Some(repo) => print_repository_summary(repo),
            None => {
                let reason = registry
                    .rejected()
                    .get(name)
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                println!("  {} {}", "▸".red(), name.bold());
                println!("    Path:     {}", registry.raw_path(name).unwrap_or("").dimmed());
                println!("    Invalid:  {}", reason.red());
                println!();
            }
        }
    }

    Ok(())
}

/// Show the effective settings of one repository
pub fn show(name: &str, as_ini: bool, config: &Config) -> Result<()> {
    let registry = load(config)?;

    if let Some(err) = registry.rejected().get(name) {
        bail!("Repository '{}' is invalid: {}", name, err);
    }
    let Some(repo) = registry.repository(name) else {
        bail!("Unknown repo '{}'", name);
    };

    if as_ini {
        print!("{}", render_ini(repo));
    } else {
        print_settings(repo);
    }

    Ok(())
}

/// Effective settings of every valid repository, sorted by name
pub fn show_all(as_ini: bool, config: &Config) -> Result<()> {
    let registry = load(config)?;

    for (idx, repo) in registry.repositories().enumerate() {
        if idx > 0 {
            println!();
        }
        if as_ini {
            print!("{}", render_ini(repo));
        } else {
            println!("{}", repo.name.cyan().bold());
            print_settings(repo);
        }
    }

    for (name, err) in registry.rejected() {
        eprintln!("{} Skipped invalid repository '{}': {}", "✗".red(), name, err);
    }

    Ok(())
}

fn print_settings(repo: &RepositoryDefinition) {
    for (key, value) in repo.settings() {
        let value = if value.is_empty() {
            "-".dimmed()
        } else {
            value.normal()
        };
        println!("{:<18} {}", format!("{}:", key).bold(), value);
    }
}

fn load(config: &Config) -> Result<Registry> {
    config
        .store()
        .load()
        .with_context(|| format!("Failed to read {}", config.dotfile.display()))
}

/// Print a repository summary
fn print_repository_summary(repo: &RepositoryDefinition) {
    println!("  {} {}", "▸".cyan(), repo.name.bold());
    println!("    Path:     {}", repo.path.display().to_string().dimmed());
    for action in Action::ALL {
        let schedule = repo
            .schedule_for(action)
            .map(|expr| expr.to_string().normal())
            .unwrap_or_else(|| "off".dimmed());
        println!("    {:<9} {}", format!("{}:", capitalize(action.as_str())), schedule);
    }
    println!();
}

/// Effective settings as a registry section
fn render_ini(repo: &RepositoryDefinition) -> String {
    let mut document = IniDocument::new();
    let section = document.ensure_section(&section_name(&repo.name));
    for (key, value) in repo.settings() {
        if key != "name" && !value.is_empty() {
            section.set(key, value);
        }
    }
    document.render()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
