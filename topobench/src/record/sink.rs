use crate::error::{BenchError, Result};
use crate::record::TimingSample;
use crate::types::Rank;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Column names of the results table.
pub const CSV_HEADER: [&str; 4] = ["rank", "compute_time", "comm_time", "total_time"];

#[derive(Debug, Serialize)]
struct Row {
    rank: Rank,
    compute_time: String,
    comm_time: String,
    total_time: String,
}

impl From<&TimingSample> for Row {
    fn from(s: &TimingSample) -> Self {
        Self {
            rank: s.rank(),
            compute_time: format!("{:.4}", s.compute_seconds()),
            comm_time: format!("{:.4}", s.comm_seconds()),
            total_time: format!("{:.4}", s.total_seconds()),
        }
    }
}

/// Append-only CSV of timing samples.
///
/// The header is written with the first row if the file is empty at that
/// moment.
#[derive(Debug)]
pub struct ResultSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove any previous contents.
    pub fn reset(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        std::fs::File::create(&self.path)?;
        Ok(())
    }

    /// Write the header now if the file is empty or missing.
    ///
    /// Used before several processes start appending to the same file, where
    /// the in-process lock cannot serialize the first-row check.
    pub fn ensure_header(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if file.metadata()?.len() == 0 {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(CSV_HEADER).map_err(csv_error)?;
            writer.flush()?;
        }
        Ok(())
    }

    pub fn append(&self, sample: &TimingSample) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(Row::from(sample)).map_err(csv_error)?;
        writer.flush()?;
        Ok(())
    }
}

fn csv_error(e: csv::Error) -> BenchError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => BenchError::Io(io),
        other => BenchError::EncodeFailed(format!("csv: {other:?}")),
    }
}
