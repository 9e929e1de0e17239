//! # Record Sink
//!
//! Appends samples to the active recording file in the fixed binary layout.

use std::fs::File;
use std::io::Write;

use tracing::debug;

use crate::error::Result;
use crate::sample::codec::encode_sample;
use crate::sample::Sample;

/// Append-only writer for one recording session's file.
pub struct RecordSink {
    file: File,
    records_written: u64,
}

impl RecordSink {
    /// Wrap an open, empty recording file
    pub fn new(file: File) -> Self {
        Self {
            file,
            records_written: 0,
        }
    }

    /// Append one sample as a fixed binary record
    ///
    /// # Errors
    ///
    /// Returns `Storage` on write failure. A failed append is fatal for the
    /// session; the router closes the file and reverts to streaming.
    pub fn append(&mut self, sample: &Sample) -> Result<()> {
        self.file.write_all(&encode_sample(sample))?;
        self.records_written += 1;
        Ok(())
    }

    /// Number of records appended so far
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Close the sink, syncing the file to storage
    pub fn finish(self) -> Result<u64> {
        self.file.sync_all()?;
        debug!("Synced recording file ({} records)", self.records_written);
        Ok(self.records_written)
    }
}
