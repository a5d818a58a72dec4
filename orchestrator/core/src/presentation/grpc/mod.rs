// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent gRPC surface
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Serve the agent RPC contract over tonic

pub mod server;

pub use server::{start_agent_server, AgentRpcService};
