// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Project definitions as read from configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A user-defined `KEY=value` pair handed to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub key: String,
    pub value: String,
}

impl EnvironmentVariable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub git_url: String,
    /// Where the agent checks the repository out.
    pub local_repo_path: PathBuf,
    #[serde(default)]
    pub lane: String,
    #[serde(default)]
    pub platform: String,
    /// Explicit command line; defaults to `bundle exec fastlane <platform> <lane>`.
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(default = "default_artifact_provider")]
    pub artifact_provider: String,
}

fn default_artifact_provider() -> String {
    "local".to_string()
}

impl Project {
    /// Executable and arguments the worker should run for this project.
    pub fn command_line(&self) -> (String, Vec<String>) {
        match self.command.as_deref() {
            Some([executable, arguments @ ..]) => (executable.clone(), arguments.to_vec()),
            _ => {
                let mut arguments = vec!["exec".to_string(), "fastlane".to_string()];
                arguments.extend(
                    [&self.platform, &self.lane]
                        .into_iter()
                        .filter(|s| !s.is_empty())
                        .cloned(),
                );
                ("bundle".to_string(), arguments)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(command: Option<Vec<String>>) -> Project {
        Project {
            id: "app".to_string(),
            name: "App".to_string(),
            git_url: "https://example.com/app.git".to_string(),
            local_repo_path: PathBuf::from("/tmp/app"),
            lane: "beta".to_string(),
            platform: "ios".to_string(),
            command,
            environment_variables: vec![],
            artifact_provider: default_artifact_provider(),
        }
    }

    #[test]
    fn test_default_command_runs_fastlane_lane() {
        let (executable, arguments) = project(None).command_line();
        assert_eq!(executable, "bundle");
        assert_eq!(arguments, vec!["exec", "fastlane", "ios", "beta"]);
    }

    #[test]
    fn test_explicit_command_wins() {
        let (executable, arguments) =
            project(Some(vec!["make".to_string(), "ci".to_string()])).command_line();
        assert_eq!(executable, "make");
        assert_eq!(arguments, vec!["ci"]);
    }
}
