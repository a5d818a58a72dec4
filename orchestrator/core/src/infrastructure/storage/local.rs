// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local Filesystem Artifact Store
//!
//! Writes artifacts to `<base>/<build-root>/<filename>`. Chunks for the same
//! filename are appended in arrival order, so a file streamed in pieces is
//! reassembled on disk.
//!
//! **Limitations:**
//! - Artifacts are only reachable from the machine running the orchestrator
//! - No retention policy; old build roots must be cleaned up manually

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::domain::artifact::{sanitize_artifact_filename, ArtifactError, ArtifactStore};

pub struct LocalArtifactStore {
    /// Base directory for all build roots (e.g., "./relay-data/artifacts")
    base_path: PathBuf,
}

impl LocalArtifactStore {
    /// Create the store, making sure the base directory exists and is writable.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            ArtifactError::IoError(format!(
                "Failed to create base directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let marker = base_path.join(".relay-storage-test");
        std::fs::write(&marker, b"test").map_err(|e| {
            ArtifactError::IoError(format!(
                "Base directory {} is not writable: {}",
                base_path.display(),
                e
            ))
        })?;
        std::fs::remove_file(&marker)?;

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a build root below the base directory. Only plain relative
    /// components are accepted.
    fn resolve_root(&self, build_root: &str) -> Result<PathBuf, ArtifactError> {
        let root = Path::new(build_root);
        if !root
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(ArtifactError::PathTraversal(build_root.to_string()));
        }
        Ok(self.base_path.join(root))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn provider(&self) -> &str {
        "local"
    }

    async fn append(
        &self,
        build_root: &str,
        filename: &str,
        chunk: &[u8],
    ) -> Result<String, ArtifactError> {
        let filename = sanitize_artifact_filename(filename)?;
        let dir = self.resolve_root(build_root)?;
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(filename);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(chunk).await?;
        file.flush().await?;

        Ok(path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_chunks_append_to_one_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(temp_dir.path()).unwrap();

        let first = store.append("app/4", "x.log", b"AA").await.unwrap();
        let second = store.append("app/4", "x.log", b"BB").await.unwrap();

        assert_eq!(first, second);
        let path = temp_dir.path().join("app/4/x.log");
        assert_eq!(first, path.to_string_lossy());
        assert_eq!(std::fs::read(path).unwrap(), b"AABB");
    }

    #[tokio::test]
    async fn test_rejects_unsafe_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(temp_dir.path()).unwrap();

        assert!(matches!(
            store.append("app/4", "..", b"x").await,
            Err(ArtifactError::PathTraversal(_))
        ));
        assert!(store.append("app/4", "a/b.log", b"x").await.is_err());
        assert!(store.append("../app", "x.log", b"x").await.is_err());
        assert!(store.append("/abs", "x.log", b"x").await.is_err());
    }

    #[test]
    fn test_provider_name() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(temp_dir.path()).unwrap();
        assert_eq!(store.provider(), "local");
    }
}
