// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Relay CLI
//!
//! The `relay` binary runs either side of a remote build:
//!
//! - `relay agent serve` - Run the agent RPC service on a build machine
//! - `relay build run|list` - Run a project's build against an agent, list past builds
//! - `relay config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use relay_ci::commands::{self, AgentCommand, BuildCommand, ConfigCommand};

/// Relay CI - remote build execution
#[derive(Parser)]
#[command(name = "relay")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "RELAY_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RELAY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build agent operations
    #[command(name = "agent")]
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Run and inspect builds
    #[command(name = "build")]
    Build {
        #[command(subcommand)]
        command: BuildCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Agent { command } => commands::agent::handle_command(command, cli.config).await,
        Commands::Build { command } => commands::build::handle_command(command, cli.config).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_run() {
        let cli = Cli::try_parse_from([
            "relay", "--config", "ci.yaml", "build", "run", "ios-app", "--sha", "abc123",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ci.yaml")));
        assert!(matches!(cli.command, Commands::Build { .. }));
    }
}
