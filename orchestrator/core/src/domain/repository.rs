// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts consumed by the build runner. The interface is
//! defined here in the domain layer and implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `BuildRepository` | `Build` | `InMemoryBuildRepository`, `JsonFileBuildRepository` |
//!
//! Local persistence is the source of truth for build state: callers treat
//! every `RepositoryError` from `add_build` as fatal for the run.

use async_trait::async_trait;

use crate::domain::build::Build;
use crate::domain::project::Project;

/// Repository interface for Build aggregates
#[async_trait]
pub trait BuildRepository: Send + Sync {
    /// All builds recorded for a project, in no particular order
    async fn list_builds(&self, project_id: &str) -> Result<Vec<Build>, RepositoryError>;

    /// Find one build by number
    async fn find_build(
        &self,
        project_id: &str,
        number: u64,
    ) -> Result<Option<Build>, RepositoryError>;

    /// Save build (create or replace the snapshot with the same number).
    /// Must not return before the snapshot is durable.
    async fn add_build(&self, project: &Project, build: &Build) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => RepositoryError::NotFound(err.to_string()),
            _ => RepositoryError::Storage(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
