//! Start command
//!
//! Runs the scheduler and the control server side by side until SIGINT or
//! SIGTERM. Both share nothing but the registry file and the stop channel.

use anyhow::{Context, Result};
use clap::Args;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use grony_scheduler::executor::check_git_available;
use grony_scheduler::{CronScheduler, GitExecutor, LocalClock, SchedulerConfig};
use grony_server::AppState;

use crate::config::Config;

/// Options for `grony start`
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Seconds between registry reloads
    #[arg(long, default_value_t = 5, value_name = "SECONDS")]
    pub reload_delay: u64,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Append logs to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<std::path::PathBuf>,

    /// Kill git commands running longer than this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub exec_timeout: Option<u64>,
}

impl StartArgs {
    fn scheduler_config(&self) -> Result<SchedulerConfig> {
        let mut config = SchedulerConfig::new(Duration::from_secs(self.reload_delay));
        if let Some(seconds) = self.exec_timeout {
            config = config.with_exec_timeout(Duration::from_secs(seconds));
        }
        config.validate()?;
        Ok(config)
    }
}

pub async fn handle_start(args: StartArgs, config: &Config) -> Result<()> {
    let scheduler_config = args.scheduler_config()?;
    init_tracing(&args.log_level, args.log_file.as_deref())?;

    info!("Starting grony with registry {}", config.dotfile.display());

    let store = Arc::new(config.store());
    let registry = store
        .load_or_init()
        .with_context(|| format!("Failed to load registry {}", config.dotfile.display()))?;
    let control = registry.config().clone();
    let secret = control
        .secret
        .context("Registry has no secret after initialization")?;

    info!("Managing {} repositories", registry.len());

    match check_git_available() {
        Ok(version) => info!("Using {}", version),
        Err(e) => warn!("{:#}", e),
    }

    let (stop_tx, stop_rx) = watch::channel(false);

    let scheduler = CronScheduler::new(
        scheduler_config.clone(),
        Arc::clone(&store),
        Arc::new(GitExecutor::new(scheduler_config.exec_timeout)),
        Arc::new(LocalClock),
    );
    let scheduler_handle = tokio::spawn(scheduler.run(stop_rx.clone()));

    let mut server_handle = tokio::spawn(grony_server::serve(
        control.ipc_port,
        AppState::with_store(secret, Arc::clone(&store)),
        stop_rx,
    ));

    let finished_early = tokio::select! {
        () = shutdown_signal() => None,
        result = &mut server_handle => {
            error!("Control server exited unexpectedly");
            Some(result)
        }
    };

    let _ = stop_tx.send(true);
    let server_result = match finished_early {
        Some(result) => result,
        None => server_handle.await,
    };

    let stats = scheduler_handle.await.context("Scheduler task failed")?;
    info!(
        "grony stopped: {} ticks, {} runs, {} failed",
        stats.ticks, stats.runs_attempted, stats.runs_failed
    );

    server_result.context("Control server task failed")?
}

/// Installs the global subscriber, writing to stdout or appending to `log_file`
fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level '{}'", level))?;

    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => registry.with(fmt::layer()).init(),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}
