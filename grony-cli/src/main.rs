//! grony CLI
//!
//! Runs the scheduler and control server (`grony start`) and talks to a
//! running instance to manage repositories.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grony")]
#[command(about = "Scheduled git pull, commit and push for your repositories", long_about = None)]
struct Cli {
    /// Registry file (defaults to ~/.grony.conf)
    #[arg(long, global = true, env = "GRONY_DOTFILE")]
    dotfile: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::new(cli.dotfile)?;

    handle_command(cli.command, &config).await
}
