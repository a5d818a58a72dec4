// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// This file includes the generated protobuf code from tonic/prost

pub mod relay {
    pub mod agent {
        pub mod v1 {
            tonic::include_proto!("relay.agent.v1");
        }
    }
}

pub use relay::agent::v1::*;

use crate::domain::invocation::{
    ArtifactChunk, LogLine, RemoteError, RemoteState, ResponseEvent,
    RunRequest as DomainRunRequest,
};

impl From<DomainRunRequest> for RunRequest {
    fn from(request: DomainRunRequest) -> Self {
        Self {
            executable: request.executable,
            arguments: request.arguments,
            environment: request.environment,
        }
    }
}

impl From<RunRequest> for DomainRunRequest {
    fn from(request: RunRequest) -> Self {
        Self {
            executable: request.executable,
            arguments: request.arguments,
            environment: request.environment,
        }
    }
}

impl From<LogLine> for InvocationResponse {
    fn from(line: LogLine) -> Self {
        Self {
            kind: Some(invocation_response::Kind::Log(Log {
                message: line.message,
                status: line.status,
            })),
        }
    }
}

/// Decode a wire state value; values this build does not know map to
/// `RemoteState::Unknown`.
pub fn remote_state(value: i32) -> RemoteState {
    match State::try_from(value) {
        Ok(State::Pending) => RemoteState::Pending,
        Ok(State::Running) => RemoteState::Running,
        Ok(State::Finishing) => RemoteState::Finishing,
        Ok(State::Succeeded) => RemoteState::Succeeded,
        Ok(State::Failed) => RemoteState::Failed,
        Ok(State::Broken) => RemoteState::Broken,
        Ok(State::Rejected) => RemoteState::Rejected,
        Err(_) => RemoteState::Unknown(value),
    }
}

/// Convert a wire response into the domain event. `None` when no variant
/// is set.
pub fn response_event(response: InvocationResponse) -> Option<ResponseEvent> {
    use invocation_response::Kind;

    let event = match response.kind? {
        Kind::Log(log) => ResponseEvent::Log(LogLine {
            message: log.message,
            status: log.status,
        }),
        Kind::State(value) => ResponseEvent::State(remote_state(value)),
        Kind::Error(error) => ResponseEvent::Error(RemoteError {
            description: error.description,
            stacktrace: error.stacktrace,
        }),
        Kind::Artifact(artifact) => ResponseEvent::Artifact(ArtifactChunk {
            filename: artifact.filename,
            chunk: artifact.chunk.into(),
        }),
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_state_is_preserved() {
        assert_eq!(remote_state(State::Succeeded as i32), RemoteState::Succeeded);
        assert_eq!(remote_state(99), RemoteState::Unknown(99));
    }

    #[test]
    fn test_response_without_kind_is_skipped() {
        assert_eq!(response_event(InvocationResponse { kind: None }), None);
    }

    #[test]
    fn test_artifact_conversion() {
        let response = InvocationResponse {
            kind: Some(invocation_response::Kind::Artifact(Artifact {
                filename: "x.log".to_string(),
                chunk: b"AA".to_vec(),
            })),
        };
        assert_eq!(
            response_event(response),
            Some(ResponseEvent::Artifact(ArtifactChunk {
                filename: "x.log".to_string(),
                chunk: bytes::Bytes::from_static(b"AA"),
            }))
        );
    }
}
