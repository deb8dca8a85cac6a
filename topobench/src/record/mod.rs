//! Timing samples and the two sinks they are written to.

mod event_log;
mod sample;
mod sink;

pub use event_log::EventLog;
pub use sample::TimingSample;
pub use sink::{CSV_HEADER, ResultSink};

use crate::error::Result;
use crate::types::Rank;
use std::path::PathBuf;

/// The log sink and the result table of one run.
#[derive(Debug)]
pub struct ResultRecorder {
    log: EventLog,
    sink: ResultSink,
}

impl ResultRecorder {
    pub fn new(log_path: impl Into<PathBuf>, csv_path: impl Into<PathBuf>) -> Self {
        Self {
            log: EventLog::new(log_path),
            sink: ResultSink::new(csv_path),
        }
    }

    /// Clear both sinks. Called once per run before any worker starts.
    pub fn reset(&self) -> Result<()> {
        self.log.reset()?;
        self.sink.reset()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    /// Log an event line.
    pub fn log(&self, message: impl AsRef<str>) -> Result<()> {
        self.log.log(message)
    }

    /// Log an event attributed to `rank`.
    pub fn log_rank(&self, rank: Rank, message: impl std::fmt::Display) -> Result<()> {
        self.log.log(format!("[Rank {rank}] {message}"))
    }

    /// Append one row to the table, then write the summary line to the log.
    ///
    /// Only a failed row is an error. A log line that cannot be written is
    /// reported through `tracing` and otherwise ignored.
    pub fn record(&self, sample: &TimingSample) -> Result<()> {
        self.sink.append(sample)?;
        if let Err(e) = self.log.log(sample.summary_line()) {
            tracing::warn!(rank = sample.rank(), "event log write failed: {e}");
        }
        Ok(())
    }
}
