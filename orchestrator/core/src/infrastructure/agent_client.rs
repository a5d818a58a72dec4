// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! gRPC Agent Client
//!
//! Opens one server-streaming `RunCommand` call per build and exposes the
//! response as a stream of domain [`ResponseEvent`]s.

use async_trait::async_trait;
use futures::StreamExt;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};

use crate::domain::invocation::{
    AgentClient, AgentClientError, ResponseStream, RunRequest,
};
use crate::infrastructure::agent_proto::{self, agent_service_client::AgentServiceClient};

#[derive(Debug, Clone)]
pub struct GrpcAgentClient {
    endpoint: String,
    client: AgentServiceClient<Channel>,
}

impl GrpcAgentClient {
    /// Connect eagerly; fails if the agent is unreachable.
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self, AgentClientError> {
        let endpoint = endpoint.into();
        let channel = Self::endpoint(&endpoint)?
            .connect()
            .await
            .map_err(|e| AgentClientError::Connect {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        info!(endpoint = %endpoint, "Connected to agent");
        Ok(Self {
            client: AgentServiceClient::new(channel),
            endpoint,
        })
    }

    /// Connect on first use.
    pub fn lazy(endpoint: impl Into<String>) -> Result<Self, AgentClientError> {
        let endpoint = endpoint.into();
        let channel = Self::endpoint(&endpoint)?.connect_lazy();
        Ok(Self {
            client: AgentServiceClient::new(channel),
            endpoint,
        })
    }

    pub fn endpoint_uri(&self) -> &str {
        &self.endpoint
    }

    fn endpoint(endpoint: &str) -> Result<Endpoint, AgentClientError> {
        Endpoint::from_shared(endpoint.to_string()).map_err(|e| AgentClientError::Connect {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl AgentClient for GrpcAgentClient {
    async fn run(&self, request: RunRequest) -> Result<ResponseStream, AgentClientError> {
        debug!(endpoint = %self.endpoint, command = %request.command_line(), "Sending run request");

        // Clients are cheap to clone and share the underlying channel
        let mut client = self.client.clone();
        let response = client
            .run_command(agent_proto::RunRequest::from(request))
            .await
            .map_err(|status| AgentClientError::Rejected(status.message().to_string()))?;

        let stream = response.into_inner().filter_map(|item| async move {
            match item {
                Ok(response) => {
                    let event = agent_proto::response_event(response);
                    if event.is_none() {
                        debug!("Skipping agent response without a variant");
                    }
                    event.map(Ok)
                }
                Err(status) => Some(Err(AgentClientError::Stream(format!(
                    "{}: {}",
                    status.code(),
                    status.message()
                )))),
            }
        });

        Ok(Box::pin(stream))
    }
}
