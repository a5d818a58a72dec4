// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Commit status reporters.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use crate::domain::status_reporter::{BuildStatusReport, CommitStatusReporter, StatusReportError};

/// Reports commit statuses to the log only. Used when no source host
/// integration is configured.
#[derive(Debug, Default, Clone)]
pub struct LoggingStatusReporter;

#[async_trait]
impl CommitStatusReporter for LoggingStatusReporter {
    async fn set_build_status(&self, report: &BuildStatusReport) -> Result<(), StatusReportError> {
        info!(
            repo = %report.repo_url,
            sha = %report.sha,
            state = %report.state,
            context = %report.context,
            target_url = %report.target_url,
            description = report.description.as_deref().unwrap_or(""),
            "Commit status"
        );
        Ok(())
    }
}

/// Keeps every report it receives, in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingStatusReporter {
    reports: Arc<Mutex<Vec<BuildStatusReport>>>,
}

impl RecordingStatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<BuildStatusReport> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl CommitStatusReporter for RecordingStatusReporter {
    async fn set_build_status(&self, report: &BuildStatusReport) -> Result<(), StatusReportError> {
        self.reports.lock().push(report.clone());
        Ok(())
    }
}
