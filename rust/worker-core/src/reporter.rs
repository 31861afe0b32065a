//! Periodic progress heartbeat.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::master::{MasterClient, WorkerId};
use crate::state::{ProgressCounters, SharedState, WorkerState};

/// Background heartbeat task that runs while the worker is active.
///
/// A progress report is sent only when the worker phase, read under the
/// state guard, is RUNNING. Failures are logged and the next tick retries.
pub struct ProgressReporter {
    master: Arc<dyn MasterClient>,
    worker_id: WorkerId,
    state: SharedState,
    counters: ProgressCounters,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl ProgressReporter {
    /// Create a new heartbeat task.
    pub fn new(
        master: Arc<dyn MasterClient>,
        worker_id: WorkerId,
        state: SharedState,
        counters: ProgressCounters,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            master,
            worker_id,
            state,
            counters,
            interval,
            shutdown,
        }
    }

    /// Spawn the heartbeat onto the runtime.
    pub fn spawn(
        master: Arc<dyn MasterClient>,
        worker_id: WorkerId,
        state: SharedState,
        counters: ProgressCounters,
        interval: Duration,
    ) -> ReporterHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let span = tracing::info_span!("heartbeat", worker_id = %worker_id);
        let reporter = Self::new(master, worker_id, state, counters, interval, shutdown_rx);
        let task = tokio::spawn(reporter.run().instrument(span));

        ReporterHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    fn stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run the heartbeat loop until told to stop.
    pub async fn run(mut self) {
        loop {
            if self.stopped() {
                break;
            }

            {
                tracing::trace!("Attempting to acquire state lock");
                let state = self.state.lock().await;
                if self.stopped() {
                    break;
                }
                if *state == WorkerState::Running {
                    tracing::debug!("Worker is running, sending a progress report");
                    let report = self.counters.report(&self.worker_id).await;
                    if let Err(e) = self.master.progress(&self.worker_id, report).await {
                        tracing::warn!("Heartbeat to master failed: {}", e);
                    }
                }
            }

            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::debug!("Heartbeat stopped");
    }
}

/// Owner side of a spawned [`ProgressReporter`].
pub struct ReporterHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReporterHandle {
    /// Signal stop, then tear the task down without waiting for a drain.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        self.task.abort();
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::warn!("Heartbeat task ended abnormally: {}", e);
            }
        }
    }
}
