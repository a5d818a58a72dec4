// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use relay_core::domain::config::RelayConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write a configuration file with default values
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./relay-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(&output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  --config flag: {}", path.display()),
            None => println!("  --config flag: {}", "(not set)".dimmed()),
        }
        for path in RelayConfig::discovery_paths() {
            let marker = if path.exists() { "found".green() } else { "missing".dimmed() };
            println!("  {} ({})", path.display(), marker);
        }
        println!();
    }

    let config = RelayConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Agent:".bold());
    println!("  Endpoint: {}", config.agent.endpoint());
    println!();

    println!("{}", "CI:".bold());
    println!("  Base URL: {}", config.ci.base_url);
    println!("  Build records: {}", config.ci.data_dir.display());
    println!("  Artifacts: {}", config.ci.artifacts_dir.display());
    println!();

    println!("{}", "Global environment:".bold());
    for variable in &config.environment_variables {
        println!("  {}", variable.key);
    }
    println!();

    println!("{}", "Projects:".bold());
    for project in &config.projects {
        let (executable, arguments) = project.command_line();
        println!("  {} ({})", project.name.bold(), project.id);
        println!("    Repository: {}", project.git_url);
        println!("    Workspace: {}", project.local_repo_path.display());
        println!("    Command: {} {}", executable, arguments.join(" "));
        println!("    Artifacts: {}", project.artifact_provider);
    }

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = RelayConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path) -> Result<()> {
    let sample = RelayConfig::default().to_yaml_string()?;

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
