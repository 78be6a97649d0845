// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! `replication-manager` binary: load the configuration and supervise every
//! replication group until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use replication_manager::config::{LoggingConfig, ManagerConfig};
use replication_manager::logging::init_logging;
use replication_manager::GroupSupervisor;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "replication-manager", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(env = "REPLICATION_MANAGER_CONFIG")]
    config: PathBuf,

    /// Log filter directive; overrides `logging.level` from the configuration.
    #[arg(long, env = "REPLICATION_MANAGER_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !cli.config.exists() {
        init_logging(&LoggingConfig::default(), cli.log_level.as_deref())?;
        warn!(path = %cli.config.display(), "Configuration file not found, nothing to replicate");
        return Ok(());
    }

    let config = ManagerConfig::from_file(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    init_logging(&config.logging, cli.log_level.as_deref())?;

    if config.groups.is_empty() {
        warn!(path = %cli.config.display(), "No replication_* groups configured");
    }
    info!(
        path = %cli.config.display(),
        groups = config.groups.len(),
        "Starting replication manager"
    );

    let supervisor = GroupSupervisor::new(&config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let supervisor_task = tokio::spawn(async move { supervisor.run(shutdown_rx).await });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("Ctrl-C received, shutting down");

    let _ = shutdown_tx.send(true);
    supervisor_task.await.context("supervisor task failed")?;

    info!("Replication manager stopped");
    Ok(())
}
