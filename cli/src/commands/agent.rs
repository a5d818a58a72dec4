// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent commands
//!
//! Commands: serve

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

use relay_core::domain::config::RelayConfig;
use relay_core::presentation::grpc::start_agent_server;

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Run the agent RPC service until interrupted
    Serve {
        /// Address to bind (default: agent.host from configuration)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (default: agent.port from configuration)
        #[arg(long)]
        port: Option<u16>,
    },
}

pub async fn handle_command(command: AgentCommand, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        AgentCommand::Serve { host, port } => serve(config_path, host, port).await,
    }
}

async fn serve(config_path: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = RelayConfig::load_or_default(config_path).context("Failed to load configuration")?;

    let host = host.unwrap_or(config.agent.host);
    let port = port.unwrap_or(config.agent.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid agent bind address {host}:{port}"))?;

    println!(
        "{}",
        format!("Relay agent listening on {addr}").green()
    );

    start_agent_server(addr, shutdown_signal())
        .await
        .context("Agent server failed")?;

    info!("Agent server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
