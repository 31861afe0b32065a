//! Protocol wrapper types for master messages.
//!
//! This module provides Rust-friendly wrapper types around the wire
//! messages, with conversion traits for ergonomic usage.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Result, WorkerError};

pub(crate) use super::proto;

/// Identity of a worker; the correlation key on every master call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for WorkerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Byte range of an input file assigned to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSplit {
    pub path: PathBuf,
    pub offset: u64,
    pub length: u64,
}

impl FileSplit {
    pub fn new(path: impl Into<PathBuf>, offset: u64, length: u64) -> Self {
        Self {
            path: path.into(),
            offset,
            length,
        }
    }

    /// Exclusive end offset of the split.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }
}

impl TryFrom<proto::FileSplit> for FileSplit {
    type Error = WorkerError;

    fn try_from(split: proto::FileSplit) -> Result<Self> {
        if split.offset < 0 || split.length < 0 {
            return Err(WorkerError::protocol(format!(
                "file split has negative bounds: offset={}, length={}",
                split.offset, split.length
            )));
        }
        Ok(Self {
            path: PathBuf::from(split.path),
            offset: split.offset as u64,
            length: split.length as u64,
        })
    }
}

impl From<FileSplit> for proto::FileSplit {
    fn from(split: FileSplit) -> Self {
        Self {
            path: split.path.to_string_lossy().into_owned(),
            offset: split.offset as i64,
            length: split.length as i64,
        }
    }
}

/// Configuration handed to a worker by the master at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfiguration {
    /// Input partition this worker reads.
    pub split: FileSplit,
    /// Records per batch, interpreted by the compute capability.
    pub batch_size: u32,
    /// Number of synchronized iterations to run.
    pub iterations: u32,
    /// Extra settings merged into the worker's `[app]` configuration.
    pub properties: BTreeMap<String, String>,
}

impl TryFrom<proto::StartupConfiguration> for StartupConfiguration {
    type Error = WorkerError;

    fn try_from(config: proto::StartupConfiguration) -> Result<Self> {
        let split = config
            .split
            .ok_or_else(|| WorkerError::protocol("missing file split in startup configuration"))?;

        let batch_size = u32::try_from(config.batch_size).map_err(|_| {
            WorkerError::protocol(format!("invalid batch size: {}", config.batch_size))
        })?;
        let iterations = u32::try_from(config.iterations).map_err(|_| {
            WorkerError::protocol(format!("invalid iteration count: {}", config.iterations))
        })?;

        Ok(Self {
            split: FileSplit::try_from(split)?,
            batch_size,
            iterations,
            properties: config.properties.into_iter().collect(),
        })
    }
}

impl From<StartupConfiguration> for proto::StartupConfiguration {
    fn from(config: StartupConfiguration) -> Self {
        Self {
            split: Some(config.split.into()),
            batch_size: config.batch_size as i32,
            iterations: config.iterations as i32,
            properties: config.properties.into_iter().collect(),
        }
    }
}

/// Snapshot of a worker's progress counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    pub worker_id: WorkerId,
    pub report: BTreeMap<String, String>,
}

impl ProgressReport {
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            report: BTreeMap::new(),
        }
    }

    /// Look up a counter value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.report.get(name).map(String::as_str)
    }
}

impl From<ProgressReport> for proto::ProgressReport {
    fn from(report: ProgressReport) -> Self {
        Self {
            worker_id: report.worker_id.0,
            report: report.report.into_iter().collect(),
        }
    }
}

/// Lifetime metrics pushed once at shutdown.
pub type MetricsReport = HashMap<String, i64>;
