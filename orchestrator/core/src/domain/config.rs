// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Relay Configuration
//
// Defines the YAML configuration document shared by the agent and the
// orchestrator:
// - Agent endpoint (where the orchestrator dials, where the agent listens)
// - CI settings (public base URL, build and artifact storage roots)
// - Global environment variables handed to every build
// - Project definitions

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::domain::project::{EnvironmentVariable, Project};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub agent: AgentEndpointConfig,

    #[serde(default)]
    pub ci: CiConfig,

    /// Applied to every build, before project-specific variables
    #[serde(default)]
    pub environment_variables: Vec<EnvironmentVariable>,

    #[serde(default)]
    pub projects: Vec<Project>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEndpointConfig {
    #[serde(default = "default_agent_host")]
    pub host: String,

    #[serde(default = "default_agent_port")]
    pub port: u16,
}

fn default_agent_host() -> String {
    "127.0.0.1".to_string()
}

fn default_agent_port() -> u16 {
    50051
}

impl Default for AgentEndpointConfig {
    fn default() -> Self {
        Self {
            host: default_agent_host(),
            port: default_agent_port(),
        }
    }
}

impl AgentEndpointConfig {
    /// URI the orchestrator dials
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiConfig {
    /// Public URL of the CI web interface, used to build links
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Root for persisted build records
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Root for build artifacts
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./relay-data/builds")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("./relay-data/artifacts")
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            data_dir: default_data_dir(),
            artifacts_dir: default_artifacts_dir(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Candidate configuration paths, in discovery order
    pub fn discovery_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(path) = std::env::var("RELAY_CONFIG_PATH") {
            paths.push(PathBuf::from(path));
        }
        paths.push(PathBuf::from("./relay-config.yaml"));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".relay").join("config.yaml"));
        }
        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/relay/config.yaml"));

        paths
    }

    /// Discover configuration file using precedence order
    /// 1. RELAY_CONFIG_PATH environment variable
    /// 2. ./relay-config.yaml (working directory)
    /// 3. ~/.relay/config.yaml (user home)
    /// 4. /etc/relay/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        Self::discovery_paths().into_iter().find(|p| p.exists())
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path: fail if missing/invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::warn!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("RELAY_AGENT_HOST") {
            tracing::info!("Environment override: RELAY_AGENT_HOST={}", host);
            self.agent.host = host;
        }

        if let Ok(val) = std::env::var("RELAY_AGENT_PORT") {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: RELAY_AGENT_PORT={}", port);
                    self.agent.port = port;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for RELAY_AGENT_PORT: '{}'. Expected a port number. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(url) = std::env::var("RELAY_CI_BASE_URL") {
            tracing::info!("Environment override: RELAY_CI_BASE_URL={}", url);
            self.ci.base_url = url;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.agent.port == 0 {
            anyhow::bail!("agent.port cannot be 0");
        }

        if !(self.ci.base_url.starts_with("http://") || self.ci.base_url.starts_with("https://")) {
            anyhow::bail!(
                "Invalid ci.base_url: '{}'. Must start with http:// or https://",
                self.ci.base_url
            );
        }

        for variable in &self.environment_variables {
            if variable.key.is_empty() {
                anyhow::bail!("Global environment variable key cannot be empty");
            }
        }

        let mut seen = HashSet::new();
        for project in &self.projects {
            if project.id.is_empty() {
                anyhow::bail!("Project id cannot be empty");
            }
            if !seen.insert(project.id.as_str()) {
                anyhow::bail!("Duplicate project id: '{}'", project.id);
            }
            for variable in &project.environment_variables {
                if variable.key.is_empty() {
                    anyhow::bail!("Environment variable key cannot be empty in project: {}", project.id);
                }
            }
        }

        Ok(())
    }

    pub fn find_project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }
}
