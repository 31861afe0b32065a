// rust/worker-core/src/dataset/traits.rs

use crate::error::Result;
use crate::master::FileSplit;

/// Reads the records of one input split, pass after pass.
pub trait RecordReader: Send {
    type Record: Send;

    /// Point the reader at a split. Takes effect on the next `parse`.
    fn set_split(&mut self, split: &FileSplit) -> Result<()>;

    /// Open the split and position at its first record.
    fn parse(&mut self) -> Result<()>;

    /// Rewind to the first record of the split for another pass.
    fn reset(&mut self) -> Result<()>;

    /// Next record, or `None` once the split is exhausted.
    fn next_record(&mut self) -> Result<Option<Self::Record>>;

    /// Up to `max` records; fewer only at the end of the split.
    fn next_batch(&mut self, max: usize) -> Result<Vec<Self::Record>> {
        let mut batch = Vec::with_capacity(max.min(1024));
        while batch.len() < max {
            match self.next_record()? {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        Ok(batch)
    }
}
