// rust/worker-core/src/dataset/mod.rs

//! Input partitions for the compute capability.
//!
//! A worker is handed a [`FileSplit`](crate::master::FileSplit): a byte range
//! of an input file. A [`RecordReader`] turns that range into records and can
//! be rewound for every iteration.

mod text;
mod traits;

pub use text::TextRecordReader;
pub use traits::RecordReader;
