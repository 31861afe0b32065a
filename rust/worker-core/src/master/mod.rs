//! Worker-to-master communication.
//!
//! This module provides the RPC surface a worker uses to talk to the
//! coordinating master:
//!
//! - Connection bootstrap through a [`MasterConnector`]
//! - Startup negotiation, update exchange and the wait protocol
//! - Heartbeats, completion and metrics reporting
//!
//! The gRPC implementation lives in [`GrpcMasterClient`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::MasterConfig;
use crate::error::Result;

mod client;
pub mod proto;
pub mod protocol;

#[cfg(test)]
pub(crate) mod mock;

// Re-exports
pub use client::{GrpcConnector, GrpcMasterClient};
pub use protocol::{FileSplit, MetricsReport, ProgressReport, StartupConfiguration, WorkerId};

/// The master's RPC contract as consumed by a worker.
///
/// Every call is correlated by the worker's identity.
#[async_trait]
pub trait MasterClient: Send + Sync {
    /// Exchange the worker identity for its startup configuration.
    async fn startup(&self, worker_id: &WorkerId) -> Result<StartupConfiguration>;

    /// Heartbeat with a progress snapshot.
    async fn progress(&self, worker_id: &WorkerId, report: ProgressReport) -> Result<()>;

    /// Send an encoded update. Returns `false` when the master rejects it.
    async fn update(&self, worker_id: &WorkerId, update: Bytes) -> Result<bool>;

    /// Poll for the next aggregate update. Negative means not ready yet.
    async fn waiting(&self, worker_id: &WorkerId, last_update: i32, waiting_ms: i64)
        -> Result<i32>;

    /// Fetch an encoded aggregate update by id.
    async fn fetch(&self, worker_id: &WorkerId, update_id: i32) -> Result<Bytes>;

    /// Signal completion. Returns whether the master acknowledged it.
    async fn complete(&self, worker_id: &WorkerId, report: ProgressReport) -> Result<bool>;

    /// Push the lifetime metrics of the worker.
    async fn metrics_report(&self, worker_id: &WorkerId, metrics: MetricsReport) -> Result<()>;

    /// Tear down the connection. Calling it again is a no-op.
    async fn close(&self);
}

/// Establishes the transport to the master.
#[async_trait]
pub trait MasterConnector: Send + Sync {
    async fn connect(&self, config: &MasterConfig) -> Result<Arc<dyn MasterClient>>;
}
