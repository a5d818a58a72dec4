// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the `BuildRepository` abstraction
//! defined in the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve build snapshots
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **InMemoryBuildRepository** - Thread-safe HashMap-backed storage for
//!   tests and embedded use
//! - **JsonFileBuildRepository** - One JSON document per build on disk

pub mod json_file;

pub use json_file::JsonFileBuildRepository;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::build::Build;
use crate::domain::project::Project;
use crate::domain::repository::{BuildRepository, RepositoryError};

#[derive(Clone, Default)]
pub struct InMemoryBuildRepository {
    builds: Arc<RwLock<HashMap<String, Vec<Build>>>>,
}

impl InMemoryBuildRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> RepositoryError {
        RepositoryError::Storage("build store lock poisoned".to_string())
    }
}

#[async_trait]
impl BuildRepository for InMemoryBuildRepository {
    async fn list_builds(&self, project_id: &str) -> Result<Vec<Build>, RepositoryError> {
        let builds = self.builds.read().map_err(|_| Self::poisoned())?;
        Ok(builds.get(project_id).cloned().unwrap_or_default())
    }

    async fn find_build(
        &self,
        project_id: &str,
        number: u64,
    ) -> Result<Option<Build>, RepositoryError> {
        let builds = self.builds.read().map_err(|_| Self::poisoned())?;
        Ok(builds
            .get(project_id)
            .and_then(|list| list.iter().find(|b| b.number == number))
            .cloned())
    }

    async fn add_build(&self, project: &Project, build: &Build) -> Result<(), RepositoryError> {
        let mut builds = self.builds.write().map_err(|_| Self::poisoned())?;
        let list = builds.entry(project.id.clone()).or_default();
        match list.iter_mut().find(|b| b.number == build.number) {
            Some(existing) => *existing = build.clone(),
            None => list.push(build.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::build::{BuildStatus, GitForkConfig, TriggerKind};
    use std::path::PathBuf;

    pub(crate) fn project() -> Project {
        Project {
            id: "app".to_string(),
            name: "App".to_string(),
            git_url: "https://example.com/app.git".to_string(),
            local_repo_path: PathBuf::from("/tmp/app"),
            lane: "test".to_string(),
            platform: "ios".to_string(),
            command: None,
            environment_variables: vec![],
            artifact_provider: "local".to_string(),
        }
    }

    pub(crate) fn build(number: u64) -> Build {
        Build::pending(
            "app",
            number,
            TriggerKind::Commit,
            "test",
            "ios",
            GitForkConfig {
                sha: "abc".to_string(),
                branch: None,
                clone_url: "https://example.com/app.git".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_add_build_upserts_by_number() {
        let repo = InMemoryBuildRepository::new();
        let project = project();

        repo.add_build(&project, &build(1)).await.unwrap();
        let mut updated = build(1);
        updated.status = BuildStatus::Success;
        repo.add_build(&project, &updated).await.unwrap();
        repo.add_build(&project, &build(2)).await.unwrap();

        let builds = repo.list_builds("app").await.unwrap();
        assert_eq!(builds.len(), 2);
        let first = repo.find_build("app", 1).await.unwrap().unwrap();
        assert_eq!(first.status, BuildStatus::Success);
        assert!(repo.list_builds("other").await.unwrap().is_empty());
    }
}
