// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Artifact Storage Module
//!
//! Concrete implementations of the `ArtifactStore` trait.

pub mod local;

pub use local::LocalArtifactStore;
pub use memory::MemoryArtifactStore;

use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::artifact::{ArtifactError, ArtifactStore};

/// Artifact backend configuration
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// Files under a local directory
    Local { base_path: PathBuf },

    /// In-process buffers, for tests and dry runs
    Memory,
}

impl StorageBackend {
    /// Backend for a project's `artifact_provider` name.
    pub fn for_provider(provider: &str, base_path: PathBuf) -> Result<Self, ArtifactError> {
        match provider {
            "local" => Ok(StorageBackend::Local { base_path }),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ArtifactError::IoError(format!(
                "Unknown artifact provider '{other}'"
            ))),
        }
    }
}

/// Factory function to create an artifact store from configuration
pub fn create_artifact_store(
    backend: StorageBackend,
) -> Result<Arc<dyn ArtifactStore>, ArtifactError> {
    match backend {
        StorageBackend::Local { base_path } => Ok(Arc::new(LocalArtifactStore::new(base_path)?)),
        StorageBackend::Memory => Ok(Arc::new(MemoryArtifactStore::new())),
    }
}

mod memory {
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use crate::domain::artifact::{sanitize_artifact_filename, ArtifactError, ArtifactStore};

    /// Keeps every artifact in memory, keyed by its reference.
    #[derive(Clone, Default)]
    pub struct MemoryArtifactStore {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MemoryArtifactStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Contents stored under `reference`, if any.
        pub fn contents(&self, reference: &str) -> Option<Vec<u8>> {
            self.files.lock().ok()?.get(reference).cloned()
        }
    }

    #[async_trait]
    impl ArtifactStore for MemoryArtifactStore {
        fn provider(&self) -> &str {
            "memory"
        }

        async fn append(
            &self,
            build_root: &str,
            filename: &str,
            chunk: &[u8],
        ) -> Result<String, ArtifactError> {
            let filename = sanitize_artifact_filename(filename)?;
            let reference = format!("memory://{build_root}/{filename}");
            let mut files = self
                .files
                .lock()
                .map_err(|_| ArtifactError::IoError("artifact store lock poisoned".to_string()))?;
            files
                .entry(reference.clone())
                .or_default()
                .extend_from_slice(chunk);
            Ok(reference)
        }
    }
}
