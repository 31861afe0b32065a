// rust/worker-core/src/worker.rs

//! The worker's iteration engine.
//!
//! A [`WorkerService`] connects to the master, negotiates its startup
//! configuration and then runs the synchronous iteration protocol:
//!
//! ```text
//! compute -> update -> waiting* -> fetch -> apply -> next iteration
//! ```
//!
//! A [`ProgressReporter`] sends heartbeats alongside the loop while the
//! worker is RUNNING. After the last iteration the engine flushes its
//! metrics, sends the capability's final result and signals completion.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;

use crate::compute::{ComputableWorker, ModelUpdate};
use crate::config::WorkerConfig;
use crate::dataset::RecordReader;
use crate::error::{Result, WorkerError};
use crate::master::{MasterClient, MasterConnector, StartupConfiguration, WorkerId};
use crate::metrics::WorkerMetrics;
use crate::reporter::ProgressReporter;
use crate::state::{counters, ProgressCounters, SharedState};

/// Status returned by [`WorkerService::run`] on success.
pub const EXIT_SUCCESS: i32 = 0;
/// Status returned by [`WorkerService::run`] on any fatal condition.
pub const EXIT_FAILURE: i32 = -1;

/// Drives one worker through its whole lifetime.
pub struct WorkerService<W: ComputableWorker> {
    worker_id: WorkerId,
    config: WorkerConfig,
    connector: Arc<dyn MasterConnector>,
    reader: W::Reader,
    computable: W,
    state: SharedState,
    counters: ProgressCounters,
    metrics: WorkerMetrics,
    startup: Option<StartupConfiguration>,
    last_update: Option<i32>,
    count_total: i64,
    count_current: i64,
}

impl<W: ComputableWorker> WorkerService<W> {
    pub fn new(
        worker_id: WorkerId,
        config: WorkerConfig,
        connector: Arc<dyn MasterConnector>,
        reader: W::Reader,
        computable: W,
    ) -> Self {
        Self {
            worker_id,
            config,
            connector,
            reader,
            computable,
            state: SharedState::new(),
            counters: ProgressCounters::new(),
            metrics: WorkerMetrics::default(),
            startup: None,
            last_update: None,
            count_total: 0,
            count_current: 0,
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Local configuration, merged with the startup reply once negotiated.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn startup(&self) -> Option<&StartupConfiguration> {
        self.startup.as_ref()
    }

    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }

    pub fn counters(&self) -> &ProgressCounters {
        &self.counters
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn computable(&self) -> &W {
        &self.computable
    }

    pub fn reader(&self) -> &W::Reader {
        &self.reader
    }

    /// Id of the last master update applied, if any.
    pub fn last_update(&self) -> Option<i32> {
        self.last_update
    }

    /// Run the worker to completion.
    ///
    /// Returns [`EXIT_SUCCESS`] once every iteration ran and completion was
    /// signalled, [`EXIT_FAILURE`] on any fatal condition. No error escapes
    /// past this call.
    pub async fn run(&mut self) -> i32 {
        let span = tracing::info_span!("worker", worker_id = %self.worker_id);
        async {
            match self.execute().await {
                Ok(()) => {
                    tracing::info!("Worker finished");
                    EXIT_SUCCESS
                }
                Err(e) => {
                    tracing::error!("Worker failed: {}", e);
                    EXIT_FAILURE
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&mut self) -> Result<()> {
        let master = self.bootstrap().await?;
        let outcome = self.drive(&master).await;
        master.close().await;
        tracing::debug!("Closed connection to master");
        outcome
    }

    async fn bootstrap(&self) -> Result<Arc<dyn MasterClient>> {
        let address = &self.config.master.address;
        let master = self.connector.connect(&self.config.master).await?;
        tracing::info!("Connected to master at {}", address);
        Ok(master)
    }

    async fn drive(&mut self, master: &Arc<dyn MasterClient>) -> Result<()> {
        let startup = self.negotiate_startup(master.as_ref()).await?;
        self.prepare_input(&startup)?;
        let iterations = startup.iterations;
        self.startup = Some(startup);

        let reporter = ProgressReporter::spawn(
            master.clone(),
            self.worker_id.clone(),
            self.state.clone(),
            self.counters.clone(),
            self.config.worker.heartbeat_interval(),
        );
        self.state.mark_started().await;

        let outcome = match self.iterate(master.as_ref(), iterations).await {
            Ok(()) => {
                self.finish(master.as_ref()).await;
                Ok(())
            }
            Err(e) => Err(e),
        };

        reporter.stop().await;
        outcome
    }

    async fn negotiate_startup(&mut self, master: &dyn MasterClient) -> Result<StartupConfiguration> {
        tracing::info!("Checking in and downloading configuration from master");
        let startup = master.startup(&self.worker_id).await.map_err(|e| {
            if let Some(description) = e.service_description() {
                tracing::error!("Master refused startup: {}", description);
            }
            e
        })?;

        tracing::info!(
            "Received startup configuration, split=[{}, {}, {}], batch_size={}, iterations={}",
            startup.split.path.display(),
            startup.split.offset,
            startup.split.length,
            startup.batch_size,
            startup.iterations
        );

        self.config.merge_startup(&startup);
        self.computable.setup(&self.config)?;
        Ok(startup)
    }

    fn prepare_input(&mut self, startup: &StartupConfiguration) -> Result<()> {
        self.reader.set_split(&startup.split)?;
        self.reader.parse()
    }

    async fn iterate(&mut self, master: &dyn MasterClient, iterations: u32) -> Result<()> {
        for iteration in 0..iterations {
            tracing::debug!("Beginning iteration {}/{}", iteration + 1, iterations);

            self.state.begin_running().await;
            self.reader.reset()?;

            self.count_total += 1;
            self.count_current += 1;
            self.counters
                .set_all([
                    (counters::COUNT_TOTAL, self.count_total),
                    (counters::COUNT_CURRENT, self.count_current),
                    (counters::CURRENT_ITERATION, i64::from(iteration)),
                ])
                .await;

            let started = Instant::now();
            let update = self.computable.compute(&mut self.reader).await?;
            self.metrics.record_compute(started.elapsed());

            self.send_update(master, &update).await?;

            tracing::info!("Completed a pass, waiting on an update from master");
            let update_id = self.wait_on_master_update(master).await?;

            let bytes = master.fetch(&self.worker_id, update_id).await?;
            tracing::debug!(
                "Fetched update {} from master, {} bytes",
                update_id,
                bytes.len()
            );
            let aggregate = W::Update::from_bytes(&bytes)?;
            self.computable.update(aggregate)?;
            self.last_update = Some(update_id);

            self.count_current = 0;
            self.counters.set(counters::COUNT_CURRENT, 0).await;
            self.computable.increment_iteration();
        }

        Ok(())
    }

    /// Encode and transmit an update while holding the state guard, so the
    /// reporter never observes the send half done.
    async fn send_update(&mut self, master: &dyn MasterClient, update: &W::Update) -> Result<()> {
        let mut guard = self.state.lock().await;
        let bytes = update.to_bytes()?;

        tracing::info!("Sending an update to master");
        guard.begin_sending();
        if !master.update(&self.worker_id, bytes).await? {
            tracing::warn!("The master rejected our update");
        }
        self.metrics.record_update_sent();

        drop(guard);
        Ok(())
    }

    /// Poll `waiting` until the master publishes the next update and return
    /// its id.
    async fn wait_on_master_update(&mut self, master: &dyn MasterClient) -> Result<i32> {
        let poll_interval = self.config.worker.wait_poll_interval();
        let ceiling = self.config.worker.max_wait();
        let last_update = self.last_update.unwrap_or(0);

        let started = Instant::now();
        let mut waited = Duration::ZERO;

        loop {
            let waiting_ms = i64::try_from(waited.as_millis()).unwrap_or(i64::MAX);
            let update_id = master
                .waiting(&self.worker_id, last_update, waiting_ms)
                .await?;

            if update_id >= 0 {
                self.metrics.record_wait_time(started.elapsed());
                if let Some(previous) = self.last_update {
                    if update_id <= previous {
                        return Err(WorkerError::protocol(format!(
                            "master offered update {update_id} after update {previous} was applied"
                        )));
                    }
                }
                tracing::debug!("Update {} is ready after {:?}", update_id, waited);
                return Ok(update_id);
            }

            self.state.begin_waiting().await;

            if let Some(ceiling) = ceiling {
                if waited >= ceiling {
                    let waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
                    return Err(WorkerError::wait_timeout(waited_ms));
                }
            }

            tracing::trace!("No update from master yet, sleeping {:?}", poll_interval);
            tokio::time::sleep(poll_interval).await;
            waited = started.elapsed();
            self.metrics.record_wait_poll();
        }
    }

    /// Shutdown path after the last iteration. Every step here is best effort.
    async fn finish(&mut self, master: &dyn MasterClient) {
        let report = self.metrics.to_report();
        if let Err(e) = master.metrics_report(&self.worker_id, report).await {
            tracing::warn!("Failed to send metrics report to master: {}", e);
        }

        if let Err(e) = self.send_results(master).await {
            tracing::warn!("Failed to send final update to master: {}", e);
        }

        tracing::info!("Completed processing, notifying master that we're done");
        let report = self.counters.report(&self.worker_id).await;
        let acknowledged = match master.complete(&self.worker_id, report).await {
            Ok(acknowledged) => acknowledged,
            Err(e) => {
                tracing::warn!("Failed to signal completion to master: {}", e);
                false
            }
        };

        if !acknowledged {
            let grace = self.config.worker.completion_grace();
            tracing::debug!("Completion not acknowledged, waiting {:?} before closing", grace);
            tokio::time::sleep(grace).await;
        }
    }

    async fn send_results(&mut self, master: &dyn MasterClient) -> Result<()> {
        let Some(result) = self.computable.results()? else {
            tracing::debug!("No final result to send");
            return Ok(());
        };

        tracing::info!("Sending final update to master");
        let bytes = result.to_bytes()?;
        if !master.update(&self.worker_id, bytes).await? {
            tracing::warn!("The master rejected our final update");
        }
        self.metrics.record_update_sent();
        Ok(())
    }
}
