// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Build notifications published to live observers.
//!
//! Serialized externally tagged, so a log line reaches a dashboard as
//! `{"log": {"message": "...", "status": 0}}` and a state change as
//! `{"state": "RUNNING"}`.

use serde::{Deserialize, Serialize};

use crate::domain::invocation::{LogLine, RemoteError, RemoteState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildNotification {
    Log(LogLine),
    State(RemoteState),
    Error(RemoteError),
}

/// Topic uniquely identifying one build's event channel.
pub fn build_topic(project_id: &str, build_number: u64) -> String {
    format!("remote_runner.{project_id}.{build_number}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_is_scoped_to_project_and_build() {
        assert_eq!(build_topic("ios-app", 12), "remote_runner.ios-app.12");
        assert_ne!(build_topic("ios-app", 12), build_topic("ios-app", 13));
    }

    #[test]
    fn test_payload_shape() {
        let log = serde_json::to_value(BuildNotification::Log(LogLine::line("hi"))).unwrap();
        assert_eq!(log, serde_json::json!({"log": {"message": "hi", "status": 0}}));

        let state = serde_json::to_value(BuildNotification::State(RemoteState::Running)).unwrap();
        assert_eq!(state, serde_json::json!({"state": "RUNNING"}));
    }
}
