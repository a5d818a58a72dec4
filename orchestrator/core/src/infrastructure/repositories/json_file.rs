// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! JSON File Build Repository
//!
//! Stores each build as `<root>/<project-id>/builds/<number>.json`. Writes
//! go to a temporary file that is renamed into place, so readers never see
//! a half-written snapshot. Both the file and its directory are synced
//! before `add_build` returns.
//!
//! A record that exists but cannot be read fails the whole listing. Build
//! numbers are derived from the listing, so skipping it would hand the same
//! number out twice and overwrite the record.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

use crate::domain::artifact::sanitize_artifact_filename;
use crate::domain::build::Build;
use crate::domain::project::Project;
use crate::domain::repository::{BuildRepository, RepositoryError};

pub struct JsonFileBuildRepository {
    root: PathBuf,
}

impl JsonFileBuildRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn builds_dir(&self, project_id: &str) -> Result<PathBuf, RepositoryError> {
        // Project ids become directory names, so they get the same
        // single-component check as artifact filenames
        let project_id = sanitize_artifact_filename(project_id)
            .map_err(|e| RepositoryError::Storage(format!("invalid project id: {e}")))?;
        Ok(self.root.join(project_id).join("builds"))
    }

    async fn read_build(path: &Path) -> Result<Build, RepositoryError> {
        let content = fs::read(path).await?;
        Ok(serde_json::from_slice(&content)?)
    }
}

#[async_trait]
impl BuildRepository for JsonFileBuildRepository {
    async fn list_builds(&self, project_id: &str) -> Result<Vec<Build>, RepositoryError> {
        let dir = self.builds_dir(project_id)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut builds = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_build(&path).await {
                Ok(build) => builds.push(build),
                // Removed between read_dir and read
                Err(RepositoryError::NotFound(_)) => continue,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Unreadable build record");
                    return Err(RepositoryError::Storage(format!(
                        "unreadable build record {}: {e}",
                        path.display()
                    )));
                }
            }
        }
        builds.sort_by_key(|b| b.number);
        Ok(builds)
    }

    async fn find_build(
        &self,
        project_id: &str,
        number: u64,
    ) -> Result<Option<Build>, RepositoryError> {
        let path = self.builds_dir(project_id)?.join(format!("{number}.json"));
        match Self::read_build(&path).await {
            Ok(build) => Ok(Some(build)),
            Err(RepositoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn add_build(&self, project: &Project, build: &Build) -> Result<(), RepositoryError> {
        let dir = self.builds_dir(&project.id)?;
        fs::create_dir_all(&dir).await?;

        let path = dir.join(format!("{}.json", build.number));
        let staging = dir.join(format!(".{}.json.tmp", build.number));
        let content = serde_json::to_vec_pretty(build)?;

        let mut file = fs::File::create(&staging).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&staging, &path).await?;
        sync_dir(&dir).await?;

        debug!(
            project = %project.id,
            build = build.number,
            status = %build.status,
            "Persisted build record"
        );
        Ok(())
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), RepositoryError> {
    fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

// Directories cannot be opened for syncing here; the rename is as durable
// as the platform makes it
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), RepositoryError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::build::BuildStatus;
    use crate::infrastructure::repositories::tests::{build, project};

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileBuildRepository::new(dir.path());
        let project = project();

        assert!(repo.list_builds("app").await.unwrap().is_empty());

        repo.add_build(&project, &build(2)).await.unwrap();
        repo.add_build(&project, &build(1)).await.unwrap();
        let mut finished = build(2);
        finished.status = BuildStatus::Failure;
        repo.add_build(&project, &finished).await.unwrap();

        let builds = repo.list_builds("app").await.unwrap();
        assert_eq!(builds.iter().map(|b| b.number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(builds[1].status, BuildStatus::Failure);
        assert!(dir.path().join("app/builds/2.json").exists());

        assert_eq!(repo.find_build("app", 2).await.unwrap(), Some(finished));
        assert_eq!(repo.find_build("app", 9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreadable_record_fails_listing_and_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileBuildRepository::new(dir.path());
        let project = project();

        repo.add_build(&project, &build(1)).await.unwrap();
        let corrupt = dir.path().join("app/builds/2.json");
        std::fs::write(&corrupt, br#"{"number":2,"status":"cancelled"}"#).unwrap();

        let err = repo.list_builds("app").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Storage(ref msg) if msg.contains("2.json")));

        // Nothing can pick number 2 again off a partial listing
        let next = repo
            .list_builds("app")
            .await
            .map(|builds| crate::domain::build::next_build_number(&builds));
        assert!(next.is_err());
        assert_eq!(
            std::fs::read(&corrupt).unwrap(),
            br#"{"number":2,"status":"cancelled"}"#.to_vec()
        );
    }

    #[tokio::test]
    async fn test_staging_file_is_not_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileBuildRepository::new(dir.path());

        repo.add_build(&project(), &build(7)).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path().join("app/builds"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["7.json".to_string()]);
    }

    #[tokio::test]
    async fn test_rejects_project_id_with_separator() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileBuildRepository::new(dir.path());
        assert!(repo.list_builds("../escape").await.is_err());
    }
}
