// rust/worker-core/src/lib.rs

//! Iterative Reduce worker runtime - core library
//!
//! This crate provides the worker side of a synchronous master/worker
//! iterative protocol: the master connection, startup negotiation, the
//! iteration engine with its wait-for-update protocol, the progress
//! heartbeat and the capability traits an application implements.

pub mod codec;
pub mod compute;
pub mod config;
pub mod dataset;
pub mod error;
pub mod master;
pub mod metrics;
pub mod reporter;
pub mod state;
pub mod worker;

// Re-export commonly used types for convenience
pub use compute::{ComputableWorker, ModelUpdate};
pub use config::WorkerConfig;
pub use dataset::{RecordReader, TextRecordReader};
pub use error::{RemoteCall, Result, WorkerError};
pub use master::{
    FileSplit, GrpcConnector, MasterClient, MasterConnector, StartupConfiguration, WorkerId,
};
pub use state::WorkerState;
pub use worker::{WorkerService, EXIT_FAILURE, EXIT_SUCCESS};
