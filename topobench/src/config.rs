//! Run configuration for the harness.
//!
//! All values have defaults. Override via environment variables (prefixed
//! `TOPOBENCH_`) or the command line, which takes precedence over both.

use crate::device::DeviceKind;
use crate::error::{BenchError, Result};
use crate::types::Topology;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// Ports tried when no rendezvous port is given explicitly.
pub const DEFAULT_PORT_RANGE: RangeInclusive<u16> = 12350..=12400;

/// How many random ports are tried before giving up.
pub const PORT_SELECTION_ATTEMPTS: usize = 16;

/// How each rank is given its own unit of concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Launcher {
    /// One tokio task per rank inside the coordinator process.
    #[default]
    Tasks,
    /// One OS process per rank; the binary re-invokes itself as a worker.
    Processes,
}

impl std::str::FromStr for Launcher {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tasks" => Ok(Launcher::Tasks),
            "processes" => Ok(Launcher::Processes),
            other => Err(BenchError::Config(format!(
                "unknown launcher {other:?} (expected tasks or processes)"
            ))),
        }
    }
}

impl std::fmt::Display for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Launcher::Tasks => f.write_str("tasks"),
            Launcher::Processes => f.write_str("processes"),
        }
    }
}

/// Parameters of one benchmark run.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Number of workers.
    pub world_size: u32,

    /// Side length of the square matrices multiplied by every worker.
    pub matrix_size: usize,

    pub topology: Topology,

    /// Host every worker uses to reach the rendezvous.
    pub host: String,

    /// Fixed rendezvous port. `None` picks one from `port_range`.
    pub rendezvous_port: Option<u16>,

    pub port_range: RangeInclusive<u16>,

    /// How long joiners keep retrying and rank 0 keeps accepting before the
    /// group is declared unformable.
    pub formation_timeout: Duration,

    pub device: DeviceKind,

    pub launcher: Launcher,

    /// Seed for the compute matrices. Each rank offsets it by its rank.
    pub seed: Option<u64>,

    /// Text event log, cleared at the start of each run.
    pub log_path: PathBuf,

    /// Tabular timing results, cleared at the start of each run.
    pub csv_path: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            world_size: 4,
            matrix_size: 2048,
            topology: Topology::Ring,
            host: "127.0.0.1".to_string(),
            rendezvous_port: None,
            port_range: DEFAULT_PORT_RANGE,
            formation_timeout: Duration::from_secs(60),
            device: DeviceKind::Cpu,
            launcher: Launcher::Tasks,
            seed: None,
            log_path: PathBuf::from("log.txt"),
            csv_path: PathBuf::from("tiempos.csv"),
        }
    }
}

impl BenchConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `TOPOBENCH_WORLD_SIZE`
    /// - `TOPOBENCH_MATRIX_SIZE`
    /// - `TOPOBENCH_TOPOLOGY`
    /// - `TOPOBENCH_HOST`
    /// - `TOPOBENCH_PORT`
    /// - `TOPOBENCH_FORMATION_TIMEOUT_SECS`
    /// - `TOPOBENCH_DEVICE`
    /// - `TOPOBENCH_LOG_PATH`
    /// - `TOPOBENCH_CSV_PATH`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from an arbitrary
    /// lookup, so tests need not mutate the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(n) = lookup("TOPOBENCH_WORLD_SIZE").and_then(|v| v.parse().ok()) {
            cfg.world_size = n;
        }
        if let Some(n) = lookup("TOPOBENCH_MATRIX_SIZE").and_then(|v| v.parse().ok()) {
            cfg.matrix_size = n;
        }
        if let Some(t) = lookup("TOPOBENCH_TOPOLOGY").and_then(|v| v.parse().ok()) {
            cfg.topology = t;
        }
        if let Some(h) = lookup("TOPOBENCH_HOST") {
            cfg.host = h;
        }
        if let Some(p) = lookup("TOPOBENCH_PORT").and_then(|v| v.parse().ok()) {
            cfg.rendezvous_port = Some(p);
        }
        if let Some(s) = lookup("TOPOBENCH_FORMATION_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            cfg.formation_timeout = Duration::from_secs(s);
        }
        if let Some(d) = lookup("TOPOBENCH_DEVICE").and_then(|v| v.parse().ok()) {
            cfg.device = d;
        }
        if let Some(p) = lookup("TOPOBENCH_LOG_PATH") {
            cfg.log_path = PathBuf::from(p);
        }
        if let Some(p) = lookup("TOPOBENCH_CSV_PATH") {
            cfg.csv_path = PathBuf::from(p);
        }

        cfg
    }

    /// Reject configurations no run could complete with.
    pub fn validate(&self) -> Result<()> {
        if self.world_size == 0 {
            return Err(BenchError::Config("world size must be at least 1".into()));
        }
        if self.matrix_size == 0 {
            return Err(BenchError::Config("matrix size must be at least 1".into()));
        }
        if self.rendezvous_port.is_none() && self.port_range.is_empty() {
            return Err(BenchError::Config(format!(
                "empty rendezvous port range {}..={}",
                self.port_range.start(),
                self.port_range.end()
            )));
        }
        if self.host.is_empty() {
            return Err(BenchError::Config("rendezvous host is empty".into()));
        }
        Ok(())
    }
}
