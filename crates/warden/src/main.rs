//! Warden - Project Zomboid update monitor
//!
//! Usage:
//!   warden              # Monitor until interrupted (default)
//!   warden check        # One check cycle, wait for any restart it starts
//!   warden seed         # Record current versions without restarting
//!   warden versions     # Print the stored versions

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden::{MonitorLoop, Submission, VersionStore, WardenConfig};

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Restarts a Project Zomboid server when the game or its workshop addons update", long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true, default_value = "warden.toml")]
    config: PathBuf,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check for updates periodically until interrupted
    Run,

    /// Run a single check cycle and exit once any restart it triggered
    /// has finished
    Check,

    /// Record the current versions without restarting anything
    Seed,

    /// Print the versions in the store
    Versions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "warden=debug,info"
    } else {
        "warden=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WardenConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await,
        Commands::Check => check(&config).await,
        Commands::Seed => seed(&config).await,
        Commands::Versions => versions(&config),
    }
}

async fn run(config: &WardenConfig) -> Result<()> {
    let mut monitor = MonitorLoop::from_config(config)?;
    monitor.run(shutdown_signal()).await;
    Ok(())
}

async fn check(config: &WardenConfig) -> Result<()> {
    let mut monitor = MonitorLoop::from_config(config)?;
    let report = monitor.tick().await;

    if report.submission == Some(Submission::Started) {
        info!("waiting for restart workflow to finish");
        tokio::select! {
            _ = monitor.scheduler().wait_idle() => {}
            _ = shutdown_signal() => {
                // Executing cannot be cancelled; the error just means
                // the restart is already under way.
                let _ = monitor.scheduler().cancel("interrupted");
                monitor.scheduler().wait_idle().await;
            }
        }
    }

    println!(
        "changed: {}  seeded: {}  failed: {}",
        report.changed.len(),
        report.seeded.len(),
        report.failed.len()
    );
    if let Some(outcome) = monitor.scheduler().snapshot().last_outcome {
        println!("restart: {outcome:?}");
    }
    Ok(())
}

async fn seed(config: &WardenConfig) -> Result<()> {
    let mut monitor = MonitorLoop::from_config(config)?;
    let report = monitor.seed().await;
    for subject in &report.failed {
        eprintln!("could not check {subject}");
    }
    if !report.failed.is_empty() {
        anyhow::bail!("{} subject(s) could not be seeded", report.failed.len());
    }
    Ok(())
}

fn versions(config: &WardenConfig) -> Result<()> {
    let store = VersionStore::open_read_only(&config.monitor.database_path).with_context(|| {
        format!(
            "opening version store {}",
            config.monitor.database_path.display()
        )
    })?;
    let records = store.records()?;
    if records.is_empty() {
        println!("no versions recorded");
        return Ok(());
    }

    println!("{:<24} {:<20} OBSERVED", "SUBJECT", "VERSION");
    for record in records {
        println!(
            "{:<24} {:<20} {}",
            record.subject.to_string(),
            record.identifier,
            record.observed_at.to_rfc3339()
        );
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix (what systemd sends).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
