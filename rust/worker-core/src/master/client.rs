//! Master client implementation.
//!
//! This module provides the gRPC client a worker uses to communicate with
//! the master service.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

use super::proto;
use super::protocol::{MetricsReport, ProgressReport, StartupConfiguration, WorkerId};
use super::{MasterClient, MasterConnector};
use crate::config::MasterConfig;
use crate::error::{RemoteCall, Result, WorkerError};

fn method_path(call: RemoteCall) -> &'static str {
    match call {
        RemoteCall::Startup => "/iterativereduce.MasterService/Startup",
        RemoteCall::Progress => "/iterativereduce.MasterService/Progress",
        RemoteCall::Update => "/iterativereduce.MasterService/Update",
        RemoteCall::Waiting => "/iterativereduce.MasterService/Waiting",
        RemoteCall::Fetch => "/iterativereduce.MasterService/Fetch",
        RemoteCall::Complete => "/iterativereduce.MasterService/Complete",
        RemoteCall::MetricsReport => "/iterativereduce.MasterService/MetricsReport",
    }
}

/// gRPC-based master client.
pub struct GrpcMasterClient {
    address: String,
    client: RwLock<Option<Grpc<Channel>>>,
}

impl GrpcMasterClient {
    /// Connect to the master service.
    pub async fn connect(config: &MasterConfig) -> Result<Self> {
        let endpoint = Endpoint::from_shared(format!("http://{}", config.address))
            .map_err(|e| {
                WorkerError::connection_with_source(&config.address, "invalid endpoint address", e)
            })?
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout());

        let channel = endpoint.connect().await.map_err(|e| {
            WorkerError::connection_with_source(&config.address, "failed to connect", e)
        })?;

        Ok(Self {
            address: config.address.clone(),
            client: RwLock::new(Some(Grpc::new(channel))),
        })
    }

    /// Address this client was connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn get_client(&self, call: RemoteCall) -> Result<Grpc<Channel>> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| WorkerError::remote(call, "not connected to master"))
    }

    async fn unary<Req, Resp>(&self, call: RemoteCall, request: Req) -> Result<Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut client = self.get_client(call).await?;

        client
            .ready()
            .await
            .map_err(|e| WorkerError::remote_with_source(call, "master service not ready", e))?;

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let path = PathAndQuery::from_static(method_path(call));

        let response = client
            .unary(Request::new(request), path, codec)
            .await
            .map_err(|status| {
                WorkerError::remote_with_source(call, status.message().to_string(), status)
            })?;

        Ok(response.into_inner())
    }
}

#[async_trait]
impl MasterClient for GrpcMasterClient {
    async fn startup(&self, worker_id: &WorkerId) -> Result<StartupConfiguration> {
        let request = proto::StartupRequest {
            worker_id: worker_id.to_string(),
        };

        let response: proto::StartupResponse = self.unary(RemoteCall::Startup, request).await?;

        if let Some(error) = response.error {
            return Err(WorkerError::service(RemoteCall::Startup, error.description));
        }

        let config = response.config.ok_or_else(|| {
            WorkerError::remote(RemoteCall::Startup, "missing startup configuration in response")
        })?;

        StartupConfiguration::try_from(config)
    }

    async fn progress(&self, _worker_id: &WorkerId, report: ProgressReport) -> Result<()> {
        let request = proto::ProgressReport::from(report);
        let _: proto::Empty = self.unary(RemoteCall::Progress, request).await?;
        Ok(())
    }

    async fn update(&self, worker_id: &WorkerId, update: Bytes) -> Result<bool> {
        let request = proto::UpdateRequest {
            worker_id: worker_id.to_string(),
            data: update,
        };

        let response: proto::UpdateResponse = self.unary(RemoteCall::Update, request).await?;
        Ok(response.accepted)
    }

    async fn waiting(
        &self,
        worker_id: &WorkerId,
        last_update: i32,
        waiting_ms: i64,
    ) -> Result<i32> {
        let request = proto::WaitingRequest {
            worker_id: worker_id.to_string(),
            last_update,
            waiting_ms,
        };

        let response: proto::WaitingResponse = self.unary(RemoteCall::Waiting, request).await?;
        Ok(response.update_id)
    }

    async fn fetch(&self, worker_id: &WorkerId, update_id: i32) -> Result<Bytes> {
        let request = proto::FetchRequest {
            worker_id: worker_id.to_string(),
            update_id,
        };

        let response: proto::FetchResponse = self.unary(RemoteCall::Fetch, request).await?;
        Ok(response.data)
    }

    async fn complete(&self, _worker_id: &WorkerId, report: ProgressReport) -> Result<bool> {
        let request = proto::ProgressReport::from(report);
        let response: proto::CompleteResponse = self.unary(RemoteCall::Complete, request).await?;
        Ok(response.acknowledged)
    }

    async fn metrics_report(&self, worker_id: &WorkerId, metrics: MetricsReport) -> Result<()> {
        let request = proto::MetricsReportRequest {
            worker_id: worker_id.to_string(),
            metrics,
        };

        let _: proto::Empty = self.unary(RemoteCall::MetricsReport, request).await?;
        Ok(())
    }

    async fn close(&self) {
        if self.client.write().await.take().is_some() {
            tracing::debug!("Closed connection to master at {}", self.address);
        }
    }
}

/// Connector that dials the master over gRPC.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcConnector;

#[async_trait]
impl MasterConnector for GrpcConnector {
    async fn connect(&self, config: &MasterConfig) -> Result<Arc<dyn MasterClient>> {
        let client = GrpcMasterClient::connect(config).await?;
        Ok(Arc::new(client))
    }
}
