// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Remote Runner
//!
//! Owns one build's end-to-end remote execution: sends the run request to an
//! agent, consumes the response stream, drives the build status, persists
//! every status change and republishes log/state/error events on the
//! notification bus under the build's topic.
//!
//! Observers only use [`RemoteRunner::subscribe`], [`RemoteRunner::unsubscribe`]
//! and [`RemoteRunner::on_complete`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Build execution use case
//! - **Collaborators:** `AgentClient`, `BuildRepository`, `ArtifactStore`,
//!   `CommitStatusReporter`, `NotificationBus`

use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::application::environment::{build_url, build_worker_environment};
use crate::domain::artifact::{ArtifactError, ArtifactStore};
use crate::domain::build::{
    next_build_number, ArtifactRecord, Build, BuildStatus, GitForkConfig, TriggerKind,
};
use crate::domain::invocation::{
    AgentClient, AgentClientError, ArtifactChunk, RemoteError, ResponseEvent, RunRequest,
    StatusTransition,
};
use crate::domain::notification::{build_topic, BuildNotification};
use crate::domain::project::{EnvironmentVariable, Project};
use crate::domain::repository::{BuildRepository, RepositoryError};
use crate::domain::status_reporter::{BuildStatusReport, CommitStatusReporter};
use crate::infrastructure::event_bus::{NotificationBus, Subscription, SubscriptionHandle};

/// Description of a build whose command exited 0 or reported `SUCCEEDED`.
pub const SUCCESS_DESCRIPTION: &str = "All green";

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to persist build: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("Runner was already started")]
    AlreadyStarted,
}

#[derive(Debug, Clone, Default)]
pub struct RunnerSettings {
    /// Base URL of this CI instance, used for build links
    pub ci_base_url: String,
    /// Variables from global configuration, applied before project ones
    pub global_environment: Vec<EnvironmentVariable>,
}

/// Shared collaborators for every runner in the process.
#[derive(Clone)]
pub struct RunnerServices {
    pub bus: NotificationBus<BuildNotification>,
    pub builds: Arc<dyn BuildRepository>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub status_reporter: Arc<dyn CommitStatusReporter>,
    pub settings: RunnerSettings,
}

type CompletionCallback = Arc<dyn Fn() + Send + Sync>;

struct RunnerState {
    build: Build,
    started: bool,
    complete: bool,
    completion_callbacks: Vec<CompletionCallback>,
}

/// What the response stream said about the outcome, for the case where it
/// ends without a terminal state.
#[derive(Debug, Default)]
struct StreamOutcome {
    terminal_state: bool,
    saw_error: bool,
    exit_status: Option<i32>,
}

impl StreamOutcome {
    fn reconcile(&self) -> Option<(BuildStatus, String)> {
        if self.terminal_state {
            return None;
        }
        Some(match (self.saw_error, self.exit_status) {
            (true, _) => (
                BuildStatus::Failure,
                "Remote command reported an error".to_string(),
            ),
            (false, Some(0)) => (BuildStatus::Success, SUCCESS_DESCRIPTION.to_string()),
            (false, Some(status)) => (
                BuildStatus::Failure,
                format!("Remote command exited with status {status}"),
            ),
            (false, None) => (
                BuildStatus::CiProblem,
                "Agent stream ended without a result".to_string(),
            ),
        })
    }
}

pub struct RemoteRunner {
    project: Project,
    git_fork_config: GitForkConfig,
    topic: String,
    services: RunnerServices,
    client: Arc<dyn AgentClient>,
    state: Mutex<RunnerState>,
}

impl RemoteRunner {
    /// Assign the next build number and persist the `pending` build before
    /// anything is sent to the agent.
    pub async fn new(
        project: Project,
        git_fork_config: GitForkConfig,
        trigger: TriggerKind,
        services: RunnerServices,
        client: Arc<dyn AgentClient>,
    ) -> Result<Self, RunnerError> {
        let existing = services.builds.list_builds(&project.id).await?;
        let number = next_build_number(&existing);

        let build = Build::pending(
            project.id.clone(),
            number,
            trigger,
            project.lane.clone(),
            project.platform.clone(),
            git_fork_config.clone(),
        );

        services.builds.add_build(&project, &build).await.map_err(|e| {
            error!(project = %project.id, build = number, error = %e, "Failed to persist pending build");
            e
        })?;

        info!(project = %project.id, build = number, trigger = %trigger, "Build admitted");

        Ok(Self {
            topic: build_topic(&project.id, number),
            project,
            git_fork_config,
            services,
            client,
            state: Mutex::new(RunnerState {
                build,
                started: false,
                complete: false,
                completion_callbacks: Vec::new(),
            }),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn git_fork_config(&self) -> &GitForkConfig {
        &self.git_fork_config
    }

    /// Snapshot of the build as it currently stands.
    pub fn current_build(&self) -> Build {
        self.state.lock().build.clone()
    }

    /// Every payload published for this build so far, in order.
    pub fn history(&self) -> Vec<BuildNotification> {
        self.services.bus.history(&self.topic)
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().complete
    }

    /// Run the build to completion. Returns the final build status.
    ///
    /// Only a local persistence failure is returned as an error; agent and
    /// transport failures end up in the build status instead. Completion
    /// callbacks fire in every case.
    pub async fn start(&self) -> Result<BuildStatus, RunnerError> {
        {
            let mut state = self.state.lock();
            if state.started {
                return Err(RunnerError::AlreadyStarted);
            }
            state.started = true;
        }

        let result = self.run().await;
        self.finish();

        match &result {
            Ok(status) => info!(topic = %self.topic, status = %status, "Build finished"),
            Err(e) => error!(topic = %self.topic, error = %e, "Build aborted"),
        }
        result
    }

    /// Register for this build's notifications: full history first, then
    /// live events. The subscription ends once the build completes.
    ///
    /// If the build has already completed, the completion callbacks are
    /// invoked again right away so a late observer is never left waiting.
    pub fn subscribe(&self) -> Subscription<BuildNotification> {
        debug!(topic = %self.topic, "Subscribing listener");
        let subscription = self.services.bus.subscribe(&self.topic);
        self.fire_if_complete();
        subscription
    }

    /// Callback-style variant of [`RemoteRunner::subscribe`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime; see
    /// [`RemoteRunner::subscribe_with_on`].
    pub fn subscribe_with<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: FnMut(BuildNotification) + Send + 'static,
    {
        self.subscribe_with_on(&Handle::current(), handler)
    }

    /// Callback-style subscription whose delivery task runs on `runtime`,
    /// usable from threads outside any tokio runtime.
    pub fn subscribe_with_on<F>(&self, runtime: &Handle, handler: F) -> SubscriptionHandle
    where
        F: FnMut(BuildNotification) + Send + 'static,
    {
        debug!(topic = %self.topic, "Subscribing listener");
        let handle = self.services.bus.subscribe_with_on(runtime, &self.topic, handler);
        self.fire_if_complete();
        handle
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        debug!(topic = %self.topic, subscription = %handle.id().0, "Unsubscribing listener");
        self.services.bus.unsubscribe(handle)
    }

    /// Register a callback for the end of the run. Invoked immediately if
    /// the run has already completed.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: CompletionCallback = Arc::new(callback);
        let complete = {
            let mut state = self.state.lock();
            state.completion_callbacks.push(callback.clone());
            state.complete
        };
        if complete {
            callback();
        }
    }

    async fn run(&self) -> Result<BuildStatus, RunnerError> {
        let request = self.run_request();
        info!(
            topic = %self.topic,
            command = %request.command_line(),
            "Starting remote build"
        );

        let started_at = Instant::now();
        let mut outcome = StreamOutcome::default();

        let mut responses = match self.client.run(request).await {
            Ok(responses) => responses,
            Err(e) => {
                self.fail_on_agent_error(&e).await?;
                return Ok(self.status());
            }
        };

        while let Some(item) = responses.next().await {
            self.state.lock().build.duration = Some(started_at.elapsed());

            match item {
                Ok(event) => self.handle_event(event, &mut outcome).await?,
                Err(e) => {
                    self.fail_on_agent_error(&e).await?;
                    return Ok(self.status());
                }
            }
        }

        match outcome.reconcile() {
            Some((status, description)) => {
                debug!(topic = %self.topic, status = %status, "Stream ended without a terminal state");
                self.apply_status(status, Some(description));
                self.save_build_status().await?;
            }
            // Artifacts may have arrived after the last status change
            None => {
                self.save_build_locally().await?;
            }
        }

        Ok(self.status())
    }

    fn run_request(&self) -> RunRequest {
        let (executable, arguments) = self.project.command_line();
        let build = self.current_build();
        let settings = &self.services.settings;
        RunRequest {
            executable,
            arguments,
            environment: build_worker_environment(
                &self.project,
                &build,
                &settings.ci_base_url,
                &settings.global_environment,
            ),
        }
    }

    async fn handle_event(
        &self,
        event: ResponseEvent,
        outcome: &mut StreamOutcome,
    ) -> Result<(), RunnerError> {
        match event {
            ResponseEvent::Log(line) if line.is_terminal() => {
                debug!(topic = %self.topic, status = line.status, "Remote command exited");
                outcome.exit_status = Some(line.status);
            }
            ResponseEvent::Log(line) => {
                debug!(topic = %self.topic, message = %line.message, "handle log");
                self.publish(BuildNotification::Log(line));
            }
            ResponseEvent::State(state) => match state.transition() {
                StatusTransition::Ignore => {}
                StatusTransition::Apply {
                    status,
                    description,
                } => {
                    debug!(topic = %self.topic, state = ?state, "handle state transition");
                    self.publish(BuildNotification::State(state));
                    self.apply_status(status, description.map(str::to_string));
                    self.save_build_status().await?;
                    outcome.terminal_state = status.is_terminal();
                }
                StatusTransition::Unmapped => {
                    self.publish(BuildNotification::State(state));
                    error!(topic = %self.topic, state = ?state, "Unknown remote state");
                }
            },
            ResponseEvent::Error(remote) => {
                debug!(topic = %self.topic, description = %remote.description, "handle error");
                self.publish(BuildNotification::Error(remote));
                outcome.saw_error = true;
            }
            ResponseEvent::Artifact(chunk) => self.handle_artifact(chunk).await,
        }
        Ok(())
    }

    /// Append the chunk to its file under this build's root. Artifacts are
    /// not published.
    async fn handle_artifact(&self, chunk: ArtifactChunk) {
        let build_root = format!("{}/{}", self.project.id, self.state.lock().build.number);
        let artifacts = &self.services.artifacts;

        match artifacts
            .append(&build_root, &chunk.filename, &chunk.chunk)
            .await
        {
            Ok(reference) => {
                debug!(topic = %self.topic, filename = %chunk.filename, bytes = chunk.chunk.len(), "handle artifact");
                self.state.lock().build.record_artifact(ArtifactRecord {
                    artifact_type: chunk.filename,
                    reference,
                    provider: artifacts.provider().to_string(),
                });
            }
            Err(e @ (ArtifactError::PathTraversal(_) | ArtifactError::InvalidFilename(_))) => {
                warn!(topic = %self.topic, filename = %chunk.filename, error = %e, "Rejected artifact");
            }
            Err(e) => {
                error!(topic = %self.topic, filename = %chunk.filename, error = %e, "Failed to store artifact chunk");
            }
        }
    }

    /// A transport failure counts as a failed build: publish it, persist
    /// `failure`, and stop consuming.
    async fn fail_on_agent_error(&self, err: &AgentClientError) -> Result<(), RunnerError> {
        error!(topic = %self.topic, error = %err, "Agent stream failed");
        self.publish(BuildNotification::Error(RemoteError {
            description: err.to_string(),
            stacktrace: String::new(),
        }));
        self.apply_status(BuildStatus::Failure, Some(err.to_string()));
        self.save_build_status().await
    }

    fn publish(&self, notification: BuildNotification) {
        self.services.bus.publish(&self.topic, notification);
    }

    fn apply_status(&self, status: BuildStatus, description: Option<String>) {
        let mut state = self.state.lock();
        state.build.status = status;
        if description.is_some() {
            state.build.description = description;
        }
    }

    fn status(&self) -> BuildStatus {
        self.state.lock().build.status
    }

    /// Persist locally (fatal on failure), then report to the source host
    /// (logged on failure).
    async fn save_build_status(&self) -> Result<(), RunnerError> {
        let build = self.save_build_locally().await?;
        self.report_build_status(&build).await;
        Ok(())
    }

    async fn save_build_locally(&self) -> Result<Build, RunnerError> {
        let build = self.current_build();
        if let Err(e) = self.services.builds.add_build(&self.project, &build).await {
            error!(
                topic = %self.topic,
                status = %build.status,
                error = %e,
                "Error persisting build status"
            );
            return Err(e.into());
        }
        Ok(build)
    }

    async fn report_build_status(&self, build: &Build) {
        let report = BuildStatusReport {
            repo_url: self.project.git_url.clone(),
            sha: build.sha().to_string(),
            state: build.status,
            target_url: build_url(
                &self.services.settings.ci_base_url,
                &self.project.id,
                build.number,
            ),
            context: self.project.name.clone(),
            description: build.description.clone(),
        };
        if let Err(e) = self.services.status_reporter.set_build_status(&report).await {
            error!(
                topic = %self.topic,
                sha = %report.sha,
                error = %e,
                "Error reporting commit status"
            );
        }
    }

    fn finish(&self) {
        let callbacks = {
            let mut state = self.state.lock();
            state.complete = true;
            state.completion_callbacks.clone()
        };
        self.services.bus.close(&self.topic);
        for callback in callbacks {
            callback();
        }
    }

    fn fire_if_complete(&self) {
        let callbacks = {
            let state = self.state.lock();
            if !state.complete {
                return;
            }
            state.completion_callbacks.clone()
        };
        for callback in callbacks {
            callback();
        }
    }
}
