// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Build commands
//!
//! Commands: run, list

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::{ColoredString, Colorize};
use std::path::PathBuf;
use std::sync::Arc;

use relay_core::application::{RemoteRunner, RunnerServices, RunnerSettings};
use relay_core::domain::build::{Build, BuildStatus, GitForkConfig, TriggerKind};
use relay_core::domain::config::RelayConfig;
use relay_core::domain::notification::BuildNotification;
use relay_core::domain::repository::BuildRepository;
use relay_core::infrastructure::agent_client::GrpcAgentClient;
use relay_core::infrastructure::event_bus::NotificationBus;
use relay_core::infrastructure::repositories::JsonFileBuildRepository;
use relay_core::infrastructure::status_reporter::LoggingStatusReporter;
use relay_core::infrastructure::storage::{create_artifact_store, StorageBackend};

#[derive(Subcommand)]
pub enum BuildCommand {
    /// Run a project's build on the configured agent
    Run {
        /// Project ID from the configuration
        #[arg(value_name = "PROJECT_ID")]
        project: String,

        /// Commit to build
        #[arg(long)]
        sha: String,

        /// Branch the commit belongs to
        #[arg(long)]
        branch: Option<String>,

        /// Clone URL of the fork to build (default: the project's git URL)
        #[arg(long)]
        clone_url: Option<String>,

        /// What caused this build
        #[arg(long, value_enum, default_value = "manual")]
        trigger: TriggerArg,
    },

    /// List recorded builds of a project
    List {
        /// Project ID from the configuration
        #[arg(value_name = "PROJECT_ID")]
        project: String,

        /// Print builds as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TriggerArg {
    Commit,
    PullRequest,
    Nightly,
    Manual,
}

impl From<TriggerArg> for TriggerKind {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::Commit => TriggerKind::Commit,
            TriggerArg::PullRequest => TriggerKind::PullRequest,
            TriggerArg::Nightly => TriggerKind::Nightly,
            TriggerArg::Manual => TriggerKind::Manual,
        }
    }
}

pub async fn handle_command(command: BuildCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = RelayConfig::load_or_default(config_path).context("Failed to load configuration")?;

    match command {
        BuildCommand::Run {
            project,
            sha,
            branch,
            clone_url,
            trigger,
        } => run(&config, &project, sha, branch, clone_url, trigger.into()).await,
        BuildCommand::List { project, json } => list(&config, &project, json).await,
    }
}

async fn run(
    config: &RelayConfig,
    project_id: &str,
    sha: String,
    branch: Option<String>,
    clone_url: Option<String>,
    trigger: TriggerKind,
) -> Result<()> {
    let project = config
        .find_project(project_id)
        .with_context(|| format!("Unknown project '{project_id}'"))?
        .clone();

    let backend =
        StorageBackend::for_provider(&project.artifact_provider, config.ci.artifacts_dir.clone())?;
    let services = RunnerServices {
        bus: NotificationBus::new(),
        builds: Arc::new(JsonFileBuildRepository::new(config.ci.data_dir.clone())),
        artifacts: create_artifact_store(backend).context("Failed to open artifact store")?,
        status_reporter: Arc::new(LoggingStatusReporter),
        settings: RunnerSettings {
            ci_base_url: config.ci.base_url.clone(),
            global_environment: config.environment_variables.clone(),
        },
    };

    // Connect lazily so an unreachable agent is recorded as a failed build
    let client = GrpcAgentClient::lazy(config.agent.endpoint())?;

    let git_fork_config = GitForkConfig {
        sha,
        branch,
        clone_url: clone_url.unwrap_or_else(|| project.git_url.clone()),
    };

    let runner = RemoteRunner::new(project, git_fork_config, trigger, services, Arc::new(client))
        .await
        .context("Failed to admit build")?;

    println!(
        "{}",
        format!(
            "Build #{} of {} on {}",
            runner.current_build().number,
            runner.project().name,
            config.agent.endpoint()
        )
        .bold()
    );

    let mut subscription = runner.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(notification) = subscription.recv().await {
            print_notification(&notification);
        }
    });

    let status = runner.start().await.context("Build aborted")?;
    // The subscription ends once the runner closes its topic
    let _ = printer.await;

    let build = runner.current_build();
    println!();
    println!(
        "Build #{} finished: {}{}",
        build.number,
        colored_status(status),
        build
            .description
            .as_deref()
            .map(|d| format!(" ({d})"))
            .unwrap_or_default()
    );
    for artifact in &build.artifacts {
        println!("  artifact: {} -> {}", artifact.artifact_type, artifact.reference);
    }

    if status != BuildStatus::Success {
        std::process::exit(1);
    }
    Ok(())
}

async fn list(config: &RelayConfig, project_id: &str, json: bool) -> Result<()> {
    let repository = JsonFileBuildRepository::new(config.ci.data_dir.clone());
    let builds = repository
        .list_builds(project_id)
        .await
        .with_context(|| format!("Failed to list builds of '{project_id}'"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&builds)?);
        return Ok(());
    }

    if builds.is_empty() {
        println!("{}", format!("No builds recorded for '{project_id}'").dimmed());
        return Ok(());
    }

    println!(
        "{:<6} {:<12} {:<22} {:<10} {:<10}",
        "#".bold(),
        "STATUS".bold(),
        "STARTED".bold(),
        "SHA".bold(),
        "DURATION".bold()
    );
    for build in builds.iter().rev() {
        println!("{}", format_build_row(build));
    }
    Ok(())
}

fn format_build_row(build: &Build) -> String {
    let sha: String = build.sha().chars().take(8).collect();
    let duration = build
        .duration
        .map(|d| format!("{}s", d.as_secs()))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<6} {:<12} {:<22} {:<10} {:<10}",
        build.number,
        colored_status(build.status),
        build.timestamp.format("%Y-%m-%d %H:%M:%S"),
        sha,
        duration
    )
}

fn print_notification(notification: &BuildNotification) {
    match notification {
        BuildNotification::Log(line) => println!("{}", line.message),
        BuildNotification::State(state) => {
            println!("{}", format!("==> {state:?}").cyan().bold())
        }
        BuildNotification::Error(error) => {
            eprintln!("{}", format!("error: {}", error.description).red());
            if !error.stacktrace.is_empty() {
                eprintln!("{}", error.stacktrace.dimmed());
            }
        }
    }
}

fn colored_status(status: BuildStatus) -> ColoredString {
    match status {
        BuildStatus::Success => status.as_str().green(),
        BuildStatus::Failure => status.as_str().red(),
        BuildStatus::CiProblem => status.as_str().magenta(),
        BuildStatus::Running => status.as_str().yellow(),
        BuildStatus::Pending => status.as_str().dimmed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_arg_mapping() {
        assert_eq!(TriggerKind::from(TriggerArg::PullRequest), TriggerKind::PullRequest);
        assert_eq!(TriggerKind::from(TriggerArg::Manual), TriggerKind::Manual);
    }

    #[test]
    fn test_build_row_truncates_sha() {
        colored::control::set_override(false);
        let build = Build::pending(
            "app",
            3,
            TriggerKind::Commit,
            "test",
            "ios",
            GitForkConfig {
                sha: "0123456789abcdef".to_string(),
                branch: None,
                clone_url: "https://example.com/app.git".to_string(),
            },
        );
        let row = format_build_row(&build);
        assert!(row.starts_with("3 "));
        assert!(row.contains("01234567 "));
        assert!(!row.contains("89abcdef"));
        assert!(row.contains("pending"));
    }
}
