// rust/worker-core/src/dataset/text.rs

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};

use crate::error::{Result, WorkerError};
use crate::master::FileSplit;

use super::traits::RecordReader;

/// Newline-delimited records (CSV, JSONL, ...) over a byte-range split.
///
/// Line ownership follows the usual split convention: a split that does not
/// start at offset 0 skips its first, possibly partial, line, and a split
/// reads every line that starts at or before its end offset. Adjacent splits
/// therefore see each line exactly once.
#[derive(Debug, Default)]
pub struct TextRecordReader {
    split: Option<FileSplit>,
    reader: Option<BufReader<File>>,
    pos: u64,
    buf: Vec<u8>,
}

impl TextRecordReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset of the next record within the file.
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn current_split(&self) -> Result<&FileSplit> {
        self.split
            .as_ref()
            .ok_or_else(|| WorkerError::input("", "no input split assigned"))
    }

    fn seek_to_split_start(&mut self) -> Result<()> {
        let split = self.current_split()?.clone();
        let reader = self.reader.as_mut().ok_or_else(|| {
            WorkerError::input(&split.path, "input split has not been opened")
        })?;

        reader.seek(SeekFrom::Start(split.offset)).map_err(|e| {
            WorkerError::input_with_source(&split.path, "failed to seek to split start", e)
        })?;
        self.pos = split.offset;

        if split.offset != 0 {
            // The line containing the start offset belongs to the previous split
            self.buf.clear();
            let skipped = reader.read_until(b'\n', &mut self.buf).map_err(|e| {
                WorkerError::input_with_source(&split.path, "failed to read input split", e)
            })?;
            self.pos += skipped as u64;
        }

        Ok(())
    }
}

impl RecordReader for TextRecordReader {
    type Record = String;

    fn set_split(&mut self, split: &FileSplit) -> Result<()> {
        self.split = Some(split.clone());
        self.reader = None;
        self.pos = split.offset;
        Ok(())
    }

    fn parse(&mut self) -> Result<()> {
        let path = self.current_split()?.path.clone();
        let file = File::open(&path)
            .map_err(|e| WorkerError::input_with_source(&path, "failed to open input split", e))?;
        self.reader = Some(BufReader::new(file));
        self.seek_to_split_start()
    }

    fn reset(&mut self) -> Result<()> {
        if self.reader.is_none() {
            return self.parse();
        }
        self.seek_to_split_start()
    }

    fn next_record(&mut self) -> Result<Option<String>> {
        let split = self.current_split()?;
        if split.length == 0 || self.pos > split.end() {
            return Ok(None);
        }
        let path = split.path.clone();

        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| WorkerError::input(&path, "input split has not been opened"))?;

        self.buf.clear();
        let read = reader
            .read_until(b'\n', &mut self.buf)
            .map_err(|e| WorkerError::input_with_source(&path, "failed to read input split", e))?;
        if read == 0 {
            return Ok(None);
        }
        self.pos += read as u64;

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        let line = String::from_utf8(std::mem::take(&mut self.buf)).map_err(|e| {
            WorkerError::input(&path, format!("record is not valid UTF-8: {e}"))
        })?;
        Ok(Some(line))
    }
}
