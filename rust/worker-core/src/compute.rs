//! Capabilities an application plugs into the worker.

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::WorkerConfig;
use crate::dataset::RecordReader;
use crate::error::Result;

/// Unit of model state exchanged with the master.
///
/// `from_bytes(to_bytes(x))` must reproduce a value equal to `x`.
pub trait ModelUpdate: Sized + Send + 'static {
    fn to_bytes(&self) -> Result<Bytes>;

    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

/// Per-partition compute function driven by the iteration engine.
#[async_trait]
pub trait ComputableWorker: Send {
    type Update: ModelUpdate;
    type Reader: RecordReader;

    /// Called once with the configuration merged from the master's startup reply.
    fn setup(&mut self, config: &WorkerConfig) -> Result<()>;

    /// One pass over the input partition. The reader has been reset to the
    /// start of the split; batching is up to the implementation.
    async fn compute(&mut self, records: &mut Self::Reader) -> Result<Self::Update>;

    /// Apply the aggregate update published by the master.
    fn update(&mut self, update: Self::Update) -> Result<()>;

    /// Final value sent to the master once all iterations are done.
    fn results(&mut self) -> Result<Option<Self::Update>>;

    fn increment_iteration(&mut self);
}
