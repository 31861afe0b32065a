//! Scripted in-memory master for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use super::protocol::{MetricsReport, ProgressReport, StartupConfiguration, WorkerId};
use super::{FileSplit, MasterClient, MasterConnector};
use crate::config::MasterConfig;
use crate::error::{RemoteCall, Result, WorkerError};

/// A call observed by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Startup,
    Progress(ProgressReport),
    Update(Bytes),
    Waiting { last_update: i32, waiting_ms: i64 },
    Fetch(i32),
    Complete(ProgressReport),
    MetricsReport(MetricsReport),
    Close,
}

/// Behaviour knobs, set before the mock is shared.
pub struct Script {
    pub startup: std::result::Result<StartupConfiguration, String>,
    /// Not-ready answers returned before each ready id.
    pub not_ready_per_wait: usize,
    /// Ids handed out by successive ready answers; defaults to 1, 2, 3, ...
    pub ready_ids: VecDeque<i32>,
    /// Fault the n-th (0-based) call of the given kind.
    pub fail_update_at: Option<usize>,
    pub fail_waiting_at: Option<usize>,
    pub fail_fetch_at: Option<usize>,
    pub fail_progress: bool,
    pub fail_metrics: bool,
    pub fail_complete: bool,
    pub reject_updates: bool,
    pub acknowledge_complete: bool,
    /// Payload returned by `fetch` for a given update id.
    pub fetch_payload: fn(i32) -> Bytes,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            startup: Ok(StartupConfiguration {
                split: FileSplit::new("/data/part-0", 0, 1024),
                batch_size: 10,
                iterations: 3,
                properties: Default::default(),
            }),
            not_ready_per_wait: 0,
            ready_ids: VecDeque::new(),
            fail_update_at: None,
            fail_waiting_at: None,
            fail_fetch_at: None,
            fail_progress: false,
            fail_metrics: false,
            fail_complete: false,
            reject_updates: false,
            acknowledge_complete: true,
            fetch_payload: |id| Bytes::from(i64::from(id).to_be_bytes().to_vec()),
        }
    }
}

#[derive(Default)]
struct Counters {
    updates: usize,
    waits: usize,
    fetches: usize,
    not_ready_left: Option<usize>,
    published: i32,
}

pub struct MockMaster {
    script: Mutex<Script>,
    counters: Mutex<Counters>,
    calls: Mutex<Vec<Call>>,
}

impl MockMaster {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            counters: Mutex::new(Counters::default()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    pub fn progress_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Progress(_)))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MasterClient for MockMaster {
    async fn startup(&self, _worker_id: &WorkerId) -> Result<StartupConfiguration> {
        self.record(Call::Startup);
        match &self.script.lock().unwrap().startup {
            Ok(config) => Ok(config.clone()),
            Err(description) => Err(WorkerError::service(RemoteCall::Startup, description.clone())),
        }
    }

    async fn progress(&self, _worker_id: &WorkerId, report: ProgressReport) -> Result<()> {
        self.record(Call::Progress(report));
        if self.script.lock().unwrap().fail_progress {
            return Err(WorkerError::remote(RemoteCall::Progress, "heartbeat dropped"));
        }
        Ok(())
    }

    async fn update(&self, _worker_id: &WorkerId, update: Bytes) -> Result<bool> {
        self.record(Call::Update(update));
        let index = {
            let mut counters = self.counters.lock().unwrap();
            counters.updates += 1;
            counters.updates - 1
        };
        let script = self.script.lock().unwrap();
        if script.fail_update_at == Some(index) {
            return Err(WorkerError::remote(RemoteCall::Update, "connection reset"));
        }
        Ok(!script.reject_updates)
    }

    async fn waiting(
        &self,
        _worker_id: &WorkerId,
        last_update: i32,
        waiting_ms: i64,
    ) -> Result<i32> {
        self.record(Call::Waiting {
            last_update,
            waiting_ms,
        });
        let mut script = self.script.lock().unwrap();
        let mut counters = self.counters.lock().unwrap();
        let index = counters.waits;
        counters.waits += 1;
        if script.fail_waiting_at == Some(index) {
            return Err(WorkerError::remote(RemoteCall::Waiting, "master went away"));
        }

        let left = counters
            .not_ready_left
            .get_or_insert(script.not_ready_per_wait);
        if *left > 0 {
            *left -= 1;
            return Ok(-1);
        }
        counters.not_ready_left = None;

        let id = match script.ready_ids.pop_front() {
            Some(id) => id,
            None => counters.published + 1,
        };
        counters.published = id;
        Ok(id)
    }

    async fn fetch(&self, _worker_id: &WorkerId, update_id: i32) -> Result<Bytes> {
        self.record(Call::Fetch(update_id));
        let index = {
            let mut counters = self.counters.lock().unwrap();
            counters.fetches += 1;
            counters.fetches - 1
        };
        let script = self.script.lock().unwrap();
        if script.fail_fetch_at == Some(index) {
            return Err(WorkerError::remote(RemoteCall::Fetch, "update evicted"));
        }
        Ok((script.fetch_payload)(update_id))
    }

    async fn complete(&self, _worker_id: &WorkerId, report: ProgressReport) -> Result<bool> {
        self.record(Call::Complete(report));
        let script = self.script.lock().unwrap();
        if script.fail_complete {
            return Err(WorkerError::remote(RemoteCall::Complete, "master went away"));
        }
        Ok(script.acknowledge_complete)
    }

    async fn metrics_report(&self, _worker_id: &WorkerId, metrics: MetricsReport) -> Result<()> {
        self.record(Call::MetricsReport(metrics));
        if self.script.lock().unwrap().fail_metrics {
            return Err(WorkerError::remote(RemoteCall::MetricsReport, "metrics sink full"));
        }
        Ok(())
    }

    async fn close(&self) {
        self.record(Call::Close);
    }
}

/// Connector handing out a shared [`MockMaster`], or failing outright.
pub struct MockConnector {
    pub master: Arc<MockMaster>,
    pub refuse: bool,
}

#[async_trait]
impl MasterConnector for MockConnector {
    async fn connect(&self, config: &MasterConfig) -> Result<Arc<dyn MasterClient>> {
        if self.refuse {
            return Err(WorkerError::connection(&config.address, "connection refused"));
        }
        Ok(self.master.clone())
    }
}
