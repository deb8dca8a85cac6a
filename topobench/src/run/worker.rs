//! One worker's run: join, compute, exchange, record, leave.

use super::context::{WorkerContext, WorkerState};
use crate::compute::{compute_rng, run_compute};
use crate::config::BenchConfig;
use crate::device::open_device;
use crate::error::{BenchError, Result};
use crate::group::{ProcessGroup, RendezvousEndpoint};
use crate::record::{ResultRecorder, TimingSample};
use crate::topology::{Exchange, timed_exchange};
use crate::transport::TransportListener;
use crate::types::Rank;
use std::future::Future;

/// Measurements of a worker that completed its run.
#[derive(Debug, Clone)]
pub struct WorkerOutput {
    pub sample: TimingSample,
    pub exchange: Exchange,
}

#[derive(Debug)]
pub enum WorkerOutcome {
    /// Ran in this process and recorded its sample.
    Completed(WorkerOutput),
    /// Ran in a child process that exited successfully. Its sample is in
    /// the sinks.
    Exited,
    /// Failed; `during` is the state the worker was in, when known.
    Failed {
        during: Option<WorkerState>,
        error: BenchError,
    },
}

/// How one rank's run ended. Every report describes a worker in `Left`.
#[derive(Debug)]
pub struct WorkerReport {
    pub rank: Rank,
    pub outcome: WorkerOutcome,
}

impl WorkerReport {
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, WorkerOutcome::Failed { .. })
    }

    pub fn output(&self) -> Option<&WorkerOutput> {
        match &self.outcome {
            WorkerOutcome::Completed(out) => Some(out),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&BenchError> {
        match &self.outcome {
            WorkerOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Run `rank` against the rendezvous at `endpoint`.
///
/// Rank 0 binds the endpoint itself. The group is left exactly once on
/// every path out of this function.
pub async fn run_worker(
    rank: Rank,
    endpoint: &RendezvousEndpoint,
    config: &BenchConfig,
    recorder: &ResultRecorder,
) -> WorkerReport {
    let join = ProcessGroup::join(rank, config.world_size, endpoint, config.formation_timeout);
    drive(rank, join, config, recorder).await
}

/// Run rank 0 on a rendezvous listener the coordinator already bound.
pub async fn run_host_worker(
    listener: TransportListener,
    config: &BenchConfig,
    recorder: &ResultRecorder,
) -> WorkerReport {
    let join =
        ProcessGroup::join_with_listener(listener, config.world_size, config.formation_timeout);
    drive(0, join, config, recorder).await
}

struct Tracker<'a> {
    rank: Rank,
    state: WorkerState,
    recorder: &'a ResultRecorder,
}

impl Tracker<'_> {
    fn enter(&mut self, next: WorkerState) {
        tracing::debug!(rank = self.rank, from = %self.state, to = %next, "worker state");
        self.state = next;
    }

    /// Write to the event log. A log write failing does not fail the run.
    fn note(&self, message: impl std::fmt::Display) {
        if let Err(e) = self.recorder.log_rank(self.rank, message) {
            tracing::warn!(rank = self.rank, "event log write failed: {e}");
        }
    }
}

async fn drive(
    rank: Rank,
    join: impl Future<Output = Result<ProcessGroup>>,
    config: &BenchConfig,
    recorder: &ResultRecorder,
) -> WorkerReport {
    let mut tracker = Tracker {
        rank,
        state: WorkerState::Created,
        recorder,
    };
    tracker.note("Initializing process...");

    let result = match join.await {
        Ok(group) => {
            tracker.enter(WorkerState::Joined);
            let result = body(&group, &mut tracker, config).await;
            tracker.note("Finalizing process and releasing resources.");
            group.leave();
            result
        }
        Err(e) => Err(e),
    };

    let during = tracker.state;
    tracker.enter(WorkerState::Left);

    let outcome = match result {
        Ok(output) => WorkerOutcome::Completed(output),
        Err(error) => {
            let kind = error.kind();
            tracing::error!(rank, %kind, state = %during, "worker failed: {error}");
            tracker.note(format_args!("Failed with {kind} while {during}: {error}"));
            WorkerOutcome::Failed {
                during: Some(during),
                error,
            }
        }
    };
    WorkerReport { rank, outcome }
}

async fn body(
    group: &ProcessGroup,
    tracker: &mut Tracker<'_>,
    config: &BenchConfig,
) -> Result<WorkerOutput> {
    let rank = group.rank();
    let device = open_device(config.device, rank)?;
    tracker.note(format_args!("Using device: {}", device.name()));
    let ctx = WorkerContext {
        rank,
        world_size: group.world_size(),
        topology: config.topology,
        device,
    };

    tracker.enter(WorkerState::Computing);
    tracker.note("Starting matrix multiplication...");
    let compute = run_compute(
        ctx.device.clone(),
        config.matrix_size,
        compute_rng(config.seed, rank),
    )
    .await?;
    tracker.note("Multiplication finished.");

    tracker.enter(WorkerState::BarrierWait);
    group.barrier().await?;

    tracker.enter(WorkerState::Communicating);
    tracker.note(format_args!("Starting communication ({})...", ctx.topology));
    let comm = timed_exchange(ctx.topology, &ctx, group).await?;
    for (src, value) in &comm.exchange.received {
        tracker.note(format_args!("Received from Rank {src}: {value:.1}"));
    }
    tracker.note("Communication finished.");

    let sample = TimingSample::from_durations(rank, compute.elapsed, comm.elapsed);
    tracker.recorder.record(&sample)?;
    tracker.enter(WorkerState::Recorded);

    Ok(WorkerOutput {
        sample,
        exchange: comm.exchange,
    })
}
