//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod registry;
mod repo;
mod start;

pub use start::StartArgs;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler and the control server in the foreground
    Start(StartArgs),
    /// Register a repository with the running instance
    Add {
        /// Repository directory
        path: String,
        /// Name to register it under (defaults to the directory name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Unregister a repository
    Remove {
        /// Repository name
        name: String,
    },
    /// Create a default .grony file in a repository
    Init {
        /// Repository directory
        #[arg(default_value = ".")]
        path: String,
        /// Also register the repository
        #[arg(long)]
        add: bool,
    },
    /// List registered repositories
    List,
    /// Show the effective settings of a repository
    Show {
        /// Repository name
        #[arg(required_unless_present = "all")]
        name: Option<String>,
        /// Show every registered repository
        #[arg(long, conflicts_with = "name")]
        all: bool,
        /// Print as an INI section
        #[arg(long)]
        ini: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Start(args) => start::handle_start(args, config).await,
        Commands::Add { path, name } => repo::add(&path, name, config).await,
        Commands::Remove { name } => repo::remove(&name, config).await,
        Commands::Init { path, add } => repo::init(&path, add, config).await,
        Commands::List => registry::list(config),
        Commands::Show { name, all, ini } => match name {
            Some(name) if !all => registry::show(&name, ini, config),
            _ => registry::show_all(ini, config),
        },
    }
}
