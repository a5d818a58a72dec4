// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Relay CI core
//!
//! Remote build execution: the agent-side process executor and streaming
//! RPC service, and the orchestrator-side runner that drives a build's state
//! machine and fans its events out to live observers.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Crate root

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
