// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Build Script for relay-ci-core
//!
//! Compiles the agent RPC contract (`proto/relay_agent.proto`) into client
//! and server stubs. Generated code is placed in `OUT_DIR` and included via
//! `tonic::include_proto!` in `src/infrastructure/agent_proto.rs`.
//!
//! - **protoc**: vendored via `protoc-bin-vendored`
//! - **tonic-prost-build**: code generator for the Rust gRPC stubs

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Point tonic at the vendored protoc binary so the build is self-contained
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/relay_agent.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/relay_agent.proto");

    Ok(())
}
