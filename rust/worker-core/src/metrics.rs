//! Lifetime metrics accumulated by the iteration engine.

use std::time::Duration;

use crate::master::MetricsReport;

/// Metric names as reported to the master.
pub mod names {
    pub const COMPUTE_TIME: &str = "ComputableWorkerTime";
    pub const COMPUTE_EXECUTIONS: &str = "ComputableWorkerExecutions";
    pub const WAIT_COUNT: &str = "WaitCount";
    pub const WAIT_TIME: &str = "WaitTime";
    pub const UPDATES_SENT: &str = "UpdatesSent";
}

/// Monotonic counters owned by the engine and flushed once at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerMetrics {
    pub compute_time: Duration,
    pub compute_executions: u64,
    pub waits: u64,
    pub wait_time: Duration,
    pub updates_sent: u64,
}

impl WorkerMetrics {
    pub fn record_compute(&mut self, elapsed: Duration) {
        self.compute_time += elapsed;
        self.compute_executions += 1;
    }

    /// One not-ready poll of the wait protocol.
    pub fn record_wait_poll(&mut self) {
        self.waits += 1;
    }

    /// Total time spent in one completed wait.
    pub fn record_wait_time(&mut self, elapsed: Duration) {
        self.wait_time += elapsed;
    }

    pub fn record_update_sent(&mut self) {
        self.updates_sent += 1;
    }

    /// Snapshot as name -> value, durations in milliseconds.
    pub fn to_report(&self) -> MetricsReport {
        let millis = |d: Duration| i64::try_from(d.as_millis()).unwrap_or(i64::MAX);
        let count = |n: u64| i64::try_from(n).unwrap_or(i64::MAX);

        MetricsReport::from([
            (names::COMPUTE_TIME.to_string(), millis(self.compute_time)),
            (names::COMPUTE_EXECUTIONS.to_string(), count(self.compute_executions)),
            (names::WAIT_COUNT.to_string(), count(self.waits)),
            (names::WAIT_TIME.to_string(), millis(self.wait_time)),
            (names::UPDATES_SENT.to_string(), count(self.updates_sent)),
        ])
    }
}
