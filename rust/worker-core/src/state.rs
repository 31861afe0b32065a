//! Worker phase and progress counters shared between the iteration engine
//! and the heartbeat reporter.
//!
//! These are the only two values the two control flows share. Phase
//! transitions go through [`SharedState`]; the send phase is the one place
//! the guard is held across a remote call, via [`StateGuard::begin_sending`].

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::master::{ProgressReport, WorkerId};

/// Phase of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    None,
    Started,
    Running,
    Waiting,
    Update,
}

impl WorkerState {
    /// Whether `next` is a transition the engine is expected to make.
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (None, Started)
                | (Started, Running)
                | (Running, Update)
                | (Update, Waiting)
                | (Update, Running)
                | (Waiting, Waiting)
                | (Waiting, Running)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::Started => "STARTED",
            Self::Running => "RUNNING",
            Self::Waiting => "WAITING",
            Self::Update => "UPDATE",
        };
        f.write_str(name)
    }
}

fn transition(current: &mut WorkerState, next: WorkerState) {
    if *current != next {
        if current.can_transition_to(next) {
            tracing::debug!("Worker state {} -> {}", current, next);
        } else {
            tracing::warn!("Unexpected worker state transition {} -> {}", current, next);
        }
    }
    *current = next;
}

/// The worker phase behind a single async mutex.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<WorkerState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase; waits for any in-progress transition to finish.
    pub async fn current(&self) -> WorkerState {
        *self.inner.lock().await
    }

    /// NONE -> STARTED, after bootstrap succeeded.
    pub async fn mark_started(&self) {
        transition(&mut *self.inner.lock().await, WorkerState::Started);
    }

    /// Enter RUNNING at the start of an iteration.
    pub async fn begin_running(&self) {
        transition(&mut *self.inner.lock().await, WorkerState::Running);
    }

    /// Enter WAITING while polling the master for an update.
    pub async fn begin_waiting(&self) {
        transition(&mut *self.inner.lock().await, WorkerState::Waiting);
    }

    /// Hold the guard. Readers observe the phase; the engine uses it to make
    /// a multi-step transition atomic.
    pub async fn lock(&self) -> StateGuard<'_> {
        StateGuard(self.inner.lock().await)
    }
}

/// Exclusive hold on the worker phase.
pub struct StateGuard<'a>(MutexGuard<'a, WorkerState>);

impl StateGuard<'_> {
    /// Enter UPDATE. Callers keep the guard until the update is transmitted.
    pub fn begin_sending(&mut self) {
        transition(&mut self.0, WorkerState::Update);
    }
}

impl Deref for StateGuard<'_> {
    type Target = WorkerState;

    fn deref(&self) -> &WorkerState {
        &self.0
    }
}

/// Counter names published in progress reports.
pub mod counters {
    pub const COUNT_TOTAL: &str = "countTotal";
    pub const COUNT_CURRENT: &str = "countCurrent";
    pub const CURRENT_ITERATION: &str = "currentIteration";
}

/// Named progress counters written by the engine and snapshotted by the
/// reporter.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounters {
    inner: Arc<RwLock<BTreeMap<String, i64>>>,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set several counters in one exclusive section.
    pub async fn set_all<'a>(&self, values: impl IntoIterator<Item = (&'a str, i64)>) {
        let mut map = self.inner.write().await;
        for (name, value) in values {
            map.insert(name.to_string(), value);
        }
    }

    pub async fn set(&self, name: &str, value: i64) {
        self.inner.write().await.insert(name.to_string(), value);
    }

    pub async fn get(&self, name: &str) -> Option<i64> {
        self.inner.read().await.get(name).copied()
    }

    /// Build a progress report from a consistent copy of every counter.
    pub async fn report(&self, worker_id: &WorkerId) -> ProgressReport {
        let mut report = ProgressReport::new(worker_id.clone());
        {
            let map = self.inner.read().await;
            for (name, value) in map.iter() {
                report.report.insert(name.clone(), value.to_string());
            }
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            let fields: Vec<String> = report
                .report
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            tracing::debug!(
                "Created a progress report, workerId={}, {}",
                worker_id,
                fields.join(", ")
            );
        }

        report
    }
}
