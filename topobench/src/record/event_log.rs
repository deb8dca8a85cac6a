use crate::error::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only text log, one `[HH:MM:SS] <message>` line per event.
///
/// Every line is also emitted through `tracing`. Each write opens the file in
/// append mode, so worker processes sharing one path interleave whole lines.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EventLog {
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

    pub fn log(&self, message: impl AsRef<str>) -> Result<()> {
        let message = message.as_ref();
        tracing::info!("{message}");

        let line = format!("[{}] {message}\n", chrono::Local::now().format("%H:%M:%S"));
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
