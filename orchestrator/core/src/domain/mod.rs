// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer (`relay-ci-core`)
//!
//! Build aggregate, remote invocation model and the ports (traits) that the
//! application layer depends on. Apart from loading `RelayConfig`, nothing
//! here performs IO.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`build`] | `Build`, `BuildStatus`, `GitForkConfig`, `ArtifactRecord` |
//! | [`project`] | `Project`, `EnvironmentVariable` |
//! | [`invocation`] | `RunRequest`, `ResponseEvent`, `RemoteState`, `AgentClient` port |
//! | [`notification`] | `BuildNotification` payloads and topic naming |
//! | [`repository`] | `BuildRepository` port |
//! | [`status_reporter`] | `CommitStatusReporter` port |
//! | [`artifact`] | `ArtifactStore` port and filename validation |
//! | [`config`] | `RelayConfig` document |

pub mod artifact;
pub mod build;
pub mod config;
pub mod invocation;
pub mod notification;
pub mod project;
pub mod repository;
pub mod status_reporter;
