//! # Record Sink Module
//!
//! The durable end of the pipeline: every record the client parses is stamped
//! with the host's UTC capture time and appended to a flat CSV file.
//!
//! The file contract, shared with the external plotting tool, is:
//! - header `timestamp,elapsed_s,value`, present exactly once, always first
//! - one data row per record, in arrival order, never rewritten
//! - file size is monotonically non-decreasing

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use crate::error::{Result, VbattLinkError};
use crate::wire::SampleRecord;

/// CSV header row, written only when the file is absent or empty
pub const CSV_HEADER: &str = "timestamp,elapsed_s,value";

/// Consumer of parsed telemetry records.
///
/// Sink failures are fatal to the host: silently dropping records is worse
/// than dying where a supervisor can see it.
pub trait RecordSink: Send {
    /// Persist one record
    ///
    /// # Errors
    ///
    /// Returns an error when the record cannot be durably appended.
    fn append(&mut self, record: &SampleRecord) -> Result<()>;
}

/// Append-only CSV writer with synchronous per-record flushing.
///
/// Process termination loses at most the one in-flight record and never
/// corrupts rows already appended.
pub struct CsvSink {
    file: File,
    path: PathBuf,
}

impl CsvSink {
    /// Open (or create) the log file for appending.
    ///
    /// Writes the header iff the file is empty. Re-opening an existing
    /// non-empty log never writes a second header and never truncates.
    ///
    /// # Errors
    ///
    /// Returns a `Sink` error when the file cannot be opened or the header
    /// cannot be written.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| sink_error(&path, e))?;

        let needs_header = file
            .metadata()
            .map_err(|e| sink_error(&path, e))?
            .len()
            == 0;
        if needs_header {
            writeln!(file, "{}", CSV_HEADER).map_err(|e| sink_error(&path, e))?;
            file.flush().map_err(|e| sink_error(&path, e))?;
            info!("created log {} with header", path.display());
        } else {
            info!("appending to existing log {}", path.display());
        }

        Ok(Self { file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvSink {
    fn append(&mut self, record: &SampleRecord) -> Result<()> {
        // Capture time is the host clock, independent of the device's
        // session-relative elapsed clock
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        writeln!(
            self.file,
            "{},{:.1},{:.4}",
            timestamp, record.elapsed_s, record.value
        )
        .map_err(|e| sink_error(&self.path, e))?;
        self.file.flush().map_err(|e| sink_error(&self.path, e))?;
        debug!("appended record at {}", timestamp);
        Ok(())
    }
}

fn sink_error(path: &Path, source: std::io::Error) -> VbattLinkError {
    VbattLinkError::Sink {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// In-memory sink recording every appended record
    #[derive(Clone, Default)]
    pub struct MemorySink {
        pub records: Arc<Mutex<Vec<SampleRecord>>>,
        pub fail_next: Arc<Mutex<bool>>,
    }

    impl MemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn collected(&self) -> Vec<SampleRecord> {
            self.records.lock().unwrap().clone()
        }

        pub fn set_fail_next(&self) {
            *self.fail_next.lock().unwrap() = true;
        }
    }

    impl RecordSink for MemorySink {
        fn append(&mut self, record: &SampleRecord) -> Result<()> {
            if *self.fail_next.lock().unwrap() {
                return Err(VbattLinkError::Sink {
                    path: PathBuf::from("<memory>"),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "mock sink failure"),
                });
            }
            self.records.lock().unwrap().push(*record);
            Ok(())
        }
    }
}
