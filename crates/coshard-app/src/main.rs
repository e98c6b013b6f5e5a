//! coshard - MySQL sharding proxy

mod cli;
mod logging;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use coshard_driver_mysql::MySqlConnector;
use coshard_server::Server;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.logging_config())?;

    let mut config = coshard_config::load_from_dir(&cli.config_dir).with_context(|| {
        format!("failed to load configuration from {}", cli.config_dir.display())
    })?;
    if let Some(addr) = cli.addr {
        config.addr = addr;
    }

    if cli.check {
        tracing::info!(
            nodes = config.nodes.len(),
            schemas = config.schemas.len(),
            users = config.users.len(),
            "configuration is valid"
        );
        return Ok(());
    }

    let server = Server::new(&config, Arc::new(MySqlConnector::new()))
        .await
        .context("failed to start coshard server")?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
        }
    });

    server.run().await?;
    Ok(())
}
