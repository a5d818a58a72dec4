// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Artifact Storage Port
//!
//! Abstraction over "write bytes somewhere addressable". Each build gets its
//! own root; chunks for one filename always append to the same location, so
//! a file streamed in several pieces ends up as one artifact.
//!
//! Filenames arrive from the remote command and are untrusted, so every
//! store validates them with [`sanitize_artifact_filename`] before touching
//! storage.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Artifact store interface and filename validation

use async_trait::async_trait;
use std::path::{Component, Path};
use thiserror::Error;

/// Maximum accepted artifact filename length
pub const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Path traversal attempt detected: {0}")]
    PathTraversal(String),

    #[error("Invalid artifact filename: {0}")]
    InvalidFilename(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ArtifactError {
    fn from(err: std::io::Error) -> Self {
        ArtifactError::IoError(err.to_string())
    }
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Name recorded as the artifact's provider
    fn provider(&self) -> &str;

    /// Append `chunk` to `filename` under `build_root`, creating it on first
    /// use. Returns the artifact's addressable reference.
    async fn append(
        &self,
        build_root: &str,
        filename: &str,
        chunk: &[u8],
    ) -> Result<String, ArtifactError>;
}

/// Validate an artifact filename: a single, non-empty, relative path
/// component with no traversal and no null bytes.
pub fn sanitize_artifact_filename(filename: &str) -> Result<&str, ArtifactError> {
    if filename.is_empty() || filename.len() > MAX_FILENAME_LEN {
        return Err(ArtifactError::InvalidFilename(filename.to_string()));
    }

    if filename.contains('\0') {
        tracing::warn!(filename = %filename, "Artifact filename contains null byte");
        return Err(ArtifactError::InvalidFilename(
            "filename contains null byte".to_string(),
        ));
    }

    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !filename.contains(['/', '\\']) => Ok(filename),
        (Some(Component::ParentDir), _) | (_, Some(Component::ParentDir)) => {
            tracing::warn!(filename = %filename, "Artifact filename contains '..' component");
            Err(ArtifactError::PathTraversal(filename.to_string()))
        }
        _ => Err(ArtifactError::InvalidFilename(filename.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_filename() {
        assert_eq!(sanitize_artifact_filename("x.log").unwrap(), "x.log");
        assert_eq!(sanitize_artifact_filename("App.ipa").unwrap(), "App.ipa");
    }

    #[test]
    fn test_reject_parent_dir() {
        let result = sanitize_artifact_filename("..");
        assert!(matches!(result.unwrap_err(), ArtifactError::PathTraversal(_)));
    }

    #[test]
    fn test_reject_nested_and_absolute_paths() {
        assert!(sanitize_artifact_filename("logs/x.log").is_err());
        assert!(sanitize_artifact_filename("/etc/passwd").is_err());
        assert!(sanitize_artifact_filename("..\\secret").is_err());
    }

    #[test]
    fn test_reject_empty_and_null() {
        assert!(sanitize_artifact_filename("").is_err());
        assert!(sanitize_artifact_filename("x\0.log").is_err());
        assert!(sanitize_artifact_filename(&"a".repeat(MAX_FILENAME_LEN + 1)).is_err());
    }
}
