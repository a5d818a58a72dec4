// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Worker Environment
//!
//! Builds the flat `KEY=value` mapping handed to the agent for one build.
//! CI-standard variables come first (Jenkins-compatible names), then
//! user-defined variables from global configuration, then from the project.
//! Later sources win.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::domain::build::Build;
use crate::domain::project::{EnvironmentVariable, Project};

/// Branch reported when the fork config carries none.
pub const DEFAULT_BRANCH: &str = "master";

/// Value of `CI_NAME`.
pub const CI_NAME: &str = "relay-ci";

/// Public URL of a build.
pub fn build_url(ci_base_url: &str, project_id: &str, build_number: u64) -> String {
    format!(
        "{}/projects/{}/builds/{}",
        ci_base_url.trim_end_matches('/'),
        project_id,
        build_number
    )
}

pub fn build_worker_environment(
    project: &Project,
    build: &Build,
    ci_base_url: &str,
    global: &[EnvironmentVariable],
) -> HashMap<String, String> {
    let number = build.number.to_string();
    let url = build_url(ci_base_url, &project.id, build.number);
    let branch = build
        .git_fork_config
        .branch
        .as_deref()
        .filter(|b| !b.is_empty())
        .unwrap_or(DEFAULT_BRANCH)
        .to_string();

    let mut env: HashMap<String, String> = [
        ("BUILD_NUMBER", number.clone()),
        ("JOB_NAME", project.name.clone()),
        ("WORKSPACE", project.local_repo_path.to_string_lossy().into_owned()),
        ("GIT_URL", build.git_fork_config.clone_url.clone()),
        ("GIT_SHA", build.sha().to_string()),
        ("GIT_BRANCH", branch.clone()),
        ("BUILD_URL", url.clone()),
        ("CI_NAME", CI_NAME.to_string()),
        ("CI", "true".to_string()),
        ("FASTLANE_SKIP_DOCS", "true".to_string()),
        ("CI_BUILD_NUMBER", number),
        ("CI_BUILD_URL", url),
        ("CI_BRANCH", branch),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let ci_keys: Vec<String> = env.keys().cloned().collect();

    for variable in global {
        if ci_keys.contains(&variable.key) {
            warn!(key = %variable.key, "Global environment variable overwrites a CI variable");
        }
        env.insert(variable.key.clone(), variable.value.clone());
    }

    for variable in &project.environment_variables {
        if ci_keys.contains(&variable.key) {
            warn!(
                key = %variable.key,
                project = %project.id,
                "Project environment variable overwrites a CI variable"
            );
        } else if env.contains_key(&variable.key) {
            debug!(key = %variable.key, project = %project.id, "Project overrides global variable");
        }
        env.insert(variable.key.clone(), variable.value.clone());
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::build::{GitForkConfig, TriggerKind};
    use std::path::PathBuf;

    fn project(variables: Vec<EnvironmentVariable>) -> Project {
        Project {
            id: "ios-app".to_string(),
            name: "iOS App".to_string(),
            git_url: "https://example.com/app.git".to_string(),
            local_repo_path: PathBuf::from("/work/ios-app"),
            lane: "test".to_string(),
            platform: "ios".to_string(),
            command: None,
            environment_variables: variables,
            artifact_provider: "local".to_string(),
        }
    }

    fn build(branch: Option<&str>) -> Build {
        Build::pending(
            "ios-app",
            7,
            TriggerKind::Commit,
            "test",
            "ios",
            GitForkConfig {
                sha: "deadbeef".to_string(),
                branch: branch.map(str::to_string),
                clone_url: "https://example.com/fork.git".to_string(),
            },
        )
    }

    #[test]
    fn test_ci_standard_variables() {
        let env = build_worker_environment(
            &project(vec![]),
            &build(Some("feature/x")),
            "https://ci.example.com/",
            &[],
        );

        assert_eq!(env["BUILD_NUMBER"], "7");
        assert_eq!(env["CI_BUILD_NUMBER"], "7");
        assert_eq!(env["JOB_NAME"], "iOS App");
        assert_eq!(env["WORKSPACE"], "/work/ios-app");
        assert_eq!(env["GIT_URL"], "https://example.com/fork.git");
        assert_eq!(env["GIT_SHA"], "deadbeef");
        assert_eq!(env["GIT_BRANCH"], "feature/x");
        assert_eq!(env["CI_BRANCH"], "feature/x");
        assert_eq!(env["BUILD_URL"], "https://ci.example.com/projects/ios-app/builds/7");
        assert_eq!(env["CI_BUILD_URL"], env["BUILD_URL"]);
        assert_eq!(env["CI"], "true");
    }

    #[test]
    fn test_missing_branch_defaults() {
        let env = build_worker_environment(&project(vec![]), &build(None), "http://ci", &[]);
        assert_eq!(env["GIT_BRANCH"], DEFAULT_BRANCH);

        let env = build_worker_environment(&project(vec![]), &build(Some("")), "http://ci", &[]);
        assert_eq!(env["GIT_BRANCH"], DEFAULT_BRANCH);
    }

    #[test]
    fn test_overlay_order() {
        let global = vec![
            EnvironmentVariable::new("SHARED", "global"),
            EnvironmentVariable::new("ONLY_GLOBAL", "g"),
            EnvironmentVariable::new("CI", "overridden"),
        ];
        let project = project(vec![
            EnvironmentVariable::new("SHARED", "project"),
            EnvironmentVariable::new("BUILD_NUMBER", "99"),
        ]);

        let env = build_worker_environment(&project, &build(None), "http://ci", &global);

        assert_eq!(env["SHARED"], "project");
        assert_eq!(env["ONLY_GLOBAL"], "g");
        assert_eq!(env["CI"], "overridden");
        assert_eq!(env["BUILD_NUMBER"], "99");
        // The duplicated CI key keeps its original value
        assert_eq!(env["CI_BUILD_NUMBER"], "7");
    }
}
