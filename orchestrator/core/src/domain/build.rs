// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Build Aggregate
//!
//! A `Build` is one numbered execution of a project's command against a
//! specific source revision. While a run is in flight the build is owned by
//! its `RemoteRunner`; every persisted copy is a read-only snapshot.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Build record, status lifecycle and artifact records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Coarse build-lifecycle value persisted and shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Running,
    Success,
    Failure,
    CiProblem,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Running => "running",
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
            BuildStatus::CiProblem => "ci_problem",
        }
    }

    /// Whether no further transition is expected for this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Success | BuildStatus::Failure | BuildStatus::CiProblem
        )
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused a build to be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Commit,
    PullRequest,
    Nightly,
    Manual,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerKind::Commit => "commit",
            TriggerKind::PullRequest => "pull_request",
            TriggerKind::Nightly => "nightly",
            TriggerKind::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Identifies exactly which source revision is being built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitForkConfig {
    pub sha: String,
    #[serde(default)]
    pub branch: Option<String>,
    pub clone_url: String,
}

/// Pointer to bytes produced by a build, retrievable through `provider`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub reference: String,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub project_id: String,
    /// Monotonic per project, starting at 1.
    pub number: u64,
    pub status: BuildStatus,
    #[serde(default)]
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Wall-clock time since the run started; `None` until the first event.
    #[serde(default)]
    pub duration: Option<Duration>,
    pub trigger: TriggerKind,
    pub lane: String,
    pub platform: String,
    pub git_fork_config: GitForkConfig,
    #[serde(default)]
    pub artifacts: Vec<ArtifactRecord>,
    /// Versions of build tools, filled in once the checkout can be inspected.
    #[serde(default)]
    pub build_tools: HashMap<String, String>,
}

impl Build {
    /// Create a fresh `pending` build.
    pub fn pending(
        project_id: impl Into<String>,
        number: u64,
        trigger: TriggerKind,
        lane: impl Into<String>,
        platform: impl Into<String>,
        git_fork_config: GitForkConfig,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            number,
            status: BuildStatus::Pending,
            description: None,
            timestamp: Utc::now(),
            duration: None,
            trigger,
            lane: lane.into(),
            platform: platform.into(),
            git_fork_config,
            artifacts: Vec::new(),
            build_tools: HashMap::new(),
        }
    }

    pub fn sha(&self) -> &str {
        &self.git_fork_config.sha
    }

    /// Returns the artifact record with the given reference, creating it if
    /// this is the first time the reference is seen.
    pub fn record_artifact(&mut self, record: ArtifactRecord) -> &ArtifactRecord {
        let index = match self
            .artifacts
            .iter()
            .position(|a| a.reference == record.reference)
        {
            Some(index) => index,
            None => {
                self.artifacts.push(record);
                self.artifacts.len() - 1
            }
        };
        &self.artifacts[index]
    }
}

/// Next build number for a project given its existing builds.
pub fn next_build_number(existing: &[Build]) -> u64 {
    existing.iter().map(|b| b.number).max().map_or(1, |n| n + 1)
}
