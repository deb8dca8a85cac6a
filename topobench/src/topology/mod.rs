//! The three exchange protocols and the timed communication phase around
//! them.

mod all_to_all;
mod ring;
mod star;

use crate::error::Result;
use crate::group::ProcessGroup;
use crate::run::WorkerContext;
use crate::types::{Rank, Topology};
use std::time::{Duration, Instant};

/// What one rank sent and received during a protocol, in call order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exchange {
    pub sent_to: Vec<Rank>,
    /// `(source rank, value)` per receive.
    pub received: Vec<(Rank, f32)>,
}

impl Exchange {
    /// Received values only, in receive order.
    pub fn values(&self) -> Vec<f32> {
        self.received.iter().map(|(_, v)| *v).collect()
    }
}

/// Result of the timed communication phase.
#[derive(Debug, Clone)]
pub struct CommReport {
    pub exchange: Exchange,
    pub elapsed: Duration,
}

/// Run one protocol over `group`, timed.
///
/// Waits at the group barrier first so no rank starts its clock before every
/// rank has finished computing, then hands off to [`timed_exchange`].
pub async fn run_topology(
    topology: Topology,
    ctx: &WorkerContext,
    group: &ProcessGroup,
) -> Result<CommReport> {
    group.barrier().await?;
    timed_exchange(topology, ctx, group).await
}

/// The timed part of [`run_topology`]: synchronize the device, start the
/// clock, run the protocol, synchronize again, stop the clock.
///
/// Callers must have passed the group barrier.
pub async fn timed_exchange(
    topology: Topology,
    ctx: &WorkerContext,
    group: &ProcessGroup,
) -> Result<CommReport> {
    ctx.device.synchronize()?;

    let start = Instant::now();
    let exchange = match topology {
        Topology::Ring => ring::exchange(group).await?,
        Topology::Star => star::exchange(group).await?,
        Topology::AllToAll => all_to_all::exchange(group).await?,
    };
    ctx.device.synchronize()?;
    let elapsed = start.elapsed();

    tracing::debug!(
        rank = ctx.rank,
        %topology,
        sent = exchange.sent_to.len(),
        received = exchange.received.len(),
        "exchange complete"
    );
    Ok(CommReport { exchange, elapsed })
}
