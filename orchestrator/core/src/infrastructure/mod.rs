// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent_client;
pub mod agent_proto;
pub mod event_bus;
pub mod process;
pub mod repositories;
pub mod status_reporter;
pub mod storage;

pub use agent_client::GrpcAgentClient;
pub use event_bus::{NotificationBus, Subscription, SubscriptionHandle};
pub use process::{ProcessOutputSequencer, ProcessRecord};
pub use repositories::{InMemoryBuildRepository, JsonFileBuildRepository};
pub use status_reporter::{LoggingStatusReporter, RecordingStatusReporter};
pub use storage::{create_artifact_store, LocalArtifactStore, MemoryArtifactStore, StorageBackend};
