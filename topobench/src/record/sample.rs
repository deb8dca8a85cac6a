use crate::types::Rank;
use std::time::Duration;

/// One worker's measurement for one run. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSample {
    rank: Rank,
    compute_seconds: f64,
    comm_seconds: f64,
    total_seconds: f64,
}

impl TimingSample {
    /// `total` is exactly `compute + comm`; negative inputs clamp to zero.
    pub fn new(rank: Rank, compute_seconds: f64, comm_seconds: f64) -> Self {
        let compute_seconds = compute_seconds.max(0.0);
        let comm_seconds = comm_seconds.max(0.0);
        Self {
            rank,
            compute_seconds,
            comm_seconds,
            total_seconds: compute_seconds + comm_seconds,
        }
    }

    pub fn from_durations(rank: Rank, compute: Duration, comm: Duration) -> Self {
        Self::new(rank, compute.as_secs_f64(), comm.as_secs_f64())
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn compute_seconds(&self) -> f64 {
        self.compute_seconds
    }

    pub fn comm_seconds(&self) -> f64 {
        self.comm_seconds
    }

    pub fn total_seconds(&self) -> f64 {
        self.total_seconds
    }

    /// `[Rank r] Times -> Compute: ...s | Comm: ...s | Total: ...s`
    pub fn summary_line(&self) -> String {
        format!(
            "[Rank {}] Times -> Compute: {:.4}s | Comm: {:.4}s | Total: {:.4}s",
            self.rank, self.compute_seconds, self.comm_seconds, self.total_seconds
        )
    }
}
