// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod environment;
pub mod remote_runner;

pub use environment::build_worker_environment;
pub use remote_runner::{RemoteRunner, RunnerError, RunnerServices, RunnerSettings};
