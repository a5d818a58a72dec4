// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`relay-ci-core`)
//!
//! Network surface that translates external requests into calls on the
//! lower layers. **No business logic lives here.**
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`grpc`] | gRPC (Tonic) | Agent RPC service, streamed by the orchestrator |

pub mod grpc;
