//! Iterative Reduce Worker
//!
//! This binary runs one worker of an iterative-reduce job. It connects to
//! the master, receives its input split and runs parameter-averaging linear
//! regression over it.
//!
//! # Usage
//!
//! ```bash
//! # Start worker-3 against a local master
//! ir-worker --worker-id worker-3
//!
//! # Point at a remote master
//! ir-worker --worker-id worker-3 --master 10.0.0.5:50051
//!
//! # Start with configuration file
//! ir-worker --worker-id worker-3 --config worker.toml
//! ```
//!
//! The process exits with status 0 when the job completed and non-zero on
//! any fatal condition.

mod model;
mod sgd;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sgd::LinearRegressionWorker;
use worker_core::{GrpcConnector, TextRecordReader, WorkerConfig, WorkerId, WorkerService};

/// Iterative Reduce Worker
#[derive(Parser, Debug)]
#[command(name = "ir-worker")]
#[command(about = "Worker process for iterative-reduce jobs")]
struct Args {
    /// Identity reported to the master on every call
    #[arg(short, long)]
    worker_id: String,

    /// Master address as host:port, overrides the configuration file
    #[arg(short, long)]
    master: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &args.config {
        Some(path) => WorkerConfig::from_file(path)?,
        None => WorkerConfig::default(),
    }
    .with_env_overrides();
    if let Some(master) = args.master {
        config.master.address = master;
    }
    config.validate()?;

    tracing::info!("Starting worker {}", args.worker_id);
    tracing::info!("  Master: {}", config.master.address);
    tracing::info!("  Heartbeat interval: {}ms", config.worker.heartbeat_interval_ms);
    tracing::info!("  Wait poll interval: {}ms", config.worker.wait_poll_interval_ms);
    match config.worker.max_wait_ms {
        Some(max_wait) => tracing::info!("  Max wait: {}ms", max_wait),
        None => tracing::info!("  Max wait: unbounded"),
    }

    let mut worker = WorkerService::new(
        WorkerId::new(args.worker_id),
        config,
        Arc::new(GrpcConnector),
        TextRecordReader::new(),
        LinearRegressionWorker::new(),
    );

    let status = worker.run().await;
    if let Some(result) = worker.computable().weights().split_first() {
        tracing::info!("Final model: intercept={}, coefficients={:?}", result.0, result.1);
    }
    tracing::debug!("Returning with code {}", status);
    std::process::exit(status);
}
