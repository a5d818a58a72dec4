// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Remote Invocation Model
//!
//! Transport-independent view of one remote command run: the request sent
//! to an agent, the tagged events it streams back, and the [`AgentClient`]
//! port the orchestrator consumes them through.
//!
//! The gRPC wire types live in `crate::infrastructure::agent_proto`; the
//! conversion into these types happens in the client adapter so nothing
//! above the infrastructure layer ever inspects which field of a message is
//! set.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Invocation request/response model and agent client port

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use thiserror::Error;

use crate::domain::build::BuildStatus;

/// Message text of the agent's terminal log record (ASCII end-of-transmission).
pub const END_OF_TRANSMISSION: &str = "\u{4}";

/// Command an agent is asked to execute. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub executable: String,
    pub arguments: Vec<String>,
    pub environment: HashMap<String, String>,
}

impl RunRequest {
    /// Printable command line, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.executable.as_str())
            .chain(self.arguments.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One line of remote output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub message: String,
    /// Exit status on the terminal record; `0` otherwise.
    pub status: i32,
}

impl LogLine {
    pub fn line(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: 0,
        }
    }

    pub fn terminal(status: i32) -> Self {
        Self {
            message: END_OF_TRANSMISSION.to_string(),
            status,
        }
    }

    /// Whether this is the end-of-transmission record carrying the exit status.
    pub fn is_terminal(&self) -> bool {
        self.message == END_OF_TRANSMISSION
    }
}

/// Fine-grained state reported by the remote execution protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteState {
    Pending,
    Running,
    Finishing,
    Succeeded,
    Failed,
    Broken,
    Rejected,
    /// A value this orchestrator does not know how to map.
    Unknown(i32),
}

/// Effect a [`RemoteState`] has on the build it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// Keep-alive; nothing is published or persisted.
    Ignore,
    Apply {
        status: BuildStatus,
        description: Option<&'static str>,
    },
    /// Published, logged as an error, status unchanged.
    Unmapped,
}

impl RemoteState {
    pub fn transition(&self) -> StatusTransition {
        let apply = |status, description| StatusTransition::Apply {
            status,
            description,
        };
        match self {
            RemoteState::Pending => StatusTransition::Ignore,
            RemoteState::Running | RemoteState::Finishing => apply(BuildStatus::Running, None),
            RemoteState::Rejected => apply(BuildStatus::CiProblem, None),
            RemoteState::Failed | RemoteState::Broken => apply(BuildStatus::Failure, None),
            RemoteState::Succeeded => apply(BuildStatus::Success, Some("All green")),
            RemoteState::Unknown(_) => StatusTransition::Unmapped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub description: String,
    #[serde(default)]
    pub stacktrace: String,
}

/// A piece of a file produced by the remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactChunk {
    pub filename: String,
    pub chunk: Bytes,
}

/// Exactly one case per response message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    Log(LogLine),
    State(RemoteState),
    Error(RemoteError),
    Artifact(ArtifactChunk),
}

#[derive(Debug, Error)]
pub enum AgentClientError {
    #[error("Failed to connect to agent at {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Agent rejected run request: {0}")]
    Rejected(String),

    #[error("Agent stream failed: {0}")]
    Stream(String),
}

pub type ResponseStream =
    Pin<Box<dyn Stream<Item = Result<ResponseEvent, AgentClientError>> + Send>>;

/// Port through which the orchestrator asks an agent to run a command.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Send one run request and return the agent's response stream.
    async fn run(&self, request: RunRequest) -> Result<ResponseStream, AgentClientError>;
}
