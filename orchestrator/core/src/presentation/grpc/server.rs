// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! gRPC Server Implementation for the Relay Agent
//! Exposes RunCommand: spawn one process per request and stream its output

use std::future::Future;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::domain::invocation::{LogLine, RunRequest as DomainRunRequest};
use crate::infrastructure::agent_proto::agent_service_server::{AgentService, AgentServiceServer};
use crate::infrastructure::agent_proto::{InvocationResponse, RunRequest};
use crate::infrastructure::process::{ProcessOutputSequencer, ProcessRecord, SequencerError};

/// Responses buffered per call before the sequencer is back-pressured
const RESPONSE_BUFFER: usize = 16;

/// Implementation of the AgentService gRPC service
#[derive(Debug, Default, Clone)]
pub struct AgentRpcService;

impl AgentRpcService {
    pub fn new() -> Self {
        Self
    }

    /// Create a gRPC server instance
    pub fn into_server(self) -> AgentServiceServer<Self> {
        AgentServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl AgentService for AgentRpcService {
    type RunCommandStream = ReceiverStream<Result<InvocationResponse, Status>>;

    /// Spawn the requested command and stream every output line as a `Log`
    /// response, finishing with the end-of-transmission record that carries
    /// the exit status.
    async fn run_command(
        &self,
        request: Request<RunRequest>,
    ) -> Result<Response<Self::RunCommandStream>, Status> {
        let request = DomainRunRequest::from(request.into_inner());

        let mut environment_keys: Vec<&str> =
            request.environment.keys().map(String::as_str).collect();
        environment_keys.sort_unstable();
        info!(
            command = %request.command_line(),
            env = ?environment_keys,
            "Spawning process"
        );

        let mut sequencer = ProcessOutputSequencer::spawn(&request).map_err(spawn_status)?;
        info!(pid = ?sequencer.pid(), "Spawned process");

        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
        let pid = sequencer.pid();

        tokio::spawn(async move {
            while let Some(record) = sequencer.next().await {
                let line = match record {
                    ProcessRecord::Line(message) => LogLine::line(message),
                    ProcessRecord::Exit(status) => {
                        info!(pid = ?pid, status, "Process exited");
                        LogLine::terminal(status)
                    }
                };
                if tx.send(Ok(InvocationResponse::from(line))).await.is_err() {
                    // Dropping the sequencer kills the process
                    warn!(pid = ?pid, "Client disconnected before process finished");
                    return;
                }
            }
            debug!(pid = ?pid, "Response stream complete");
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

fn spawn_status(error: SequencerError) -> Status {
    warn!(error = %error, "Failed to spawn process");
    match &error {
        SequencerError::EmptyCommand => Status::invalid_argument(error.to_string()),
        SequencerError::Spawn { source, .. } => match source.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                Status::failed_precondition(error.to_string())
            }
            _ => Status::internal(error.to_string()),
        },
    }
}

/// Start the agent gRPC server; returns once `shutdown` resolves
pub async fn start_agent_server<F>(addr: SocketAddr, shutdown: F) -> Result<(), tonic::transport::Error>
where
    F: Future<Output = ()> + Send,
{
    tracing::info!("Starting relay agent gRPC server on {}", addr);

    tonic::transport::Server::builder()
        .add_service(AgentRpcService::new().into_server())
        .serve_with_shutdown(addr, shutdown)
        .await
}
