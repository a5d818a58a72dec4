// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Commit Status Reporting Port
//!
//! Reports build status to the source host (e.g. a commit status on the
//! hosting service). Failures here are recoverable: the local build record
//! stays authoritative and callers log and continue.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::build::BuildStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatusReport {
    pub repo_url: String,
    pub sha: String,
    pub state: BuildStatus,
    pub target_url: String,
    pub context: String,
    pub description: Option<String>,
}

#[derive(Debug, Error)]
pub enum StatusReportError {
    #[error("Status provider unavailable: {0}")]
    Unavailable(String),

    #[error("Status provider rejected report: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait CommitStatusReporter: Send + Sync {
    async fn set_build_status(&self, report: &BuildStatusReport) -> Result<(), StatusReportError>;
}
