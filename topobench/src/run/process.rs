//! One OS process per rank.

use super::worker::{WorkerOutcome, WorkerReport};
use crate::cli::worker_args;
use crate::config::BenchConfig;
use crate::error::{BenchError, Result};
use crate::group::RendezvousEndpoint;
use crate::types::Rank;
use tokio::process::Command;

/// Re-invoke the current executable once per rank as a `worker` and wait
/// for all of them. A child that exits non-zero, or that cannot be waited
/// on, is a failed worker. Children are never cancelled.
pub(super) async fn launch(config: &BenchConfig, endpoint: &RendezvousEndpoint) -> Result<Vec<WorkerReport>> {
    let exe = std::env::current_exe()
        .map_err(|e| BenchError::Config(format!("cannot locate own executable: {e}")))?;

    let mut children = Vec::with_capacity(config.world_size as usize);
    for rank in 0..config.world_size {
        let spawned = Command::new(&exe)
            .args(worker_args(config, endpoint, rank))
            .spawn();
        match spawned {
            Ok(child) => {
                tracing::debug!(rank, pid = ?child.id(), "spawned worker process");
                children.push((rank, Some(child)));
            }
            Err(e) => {
                tracing::error!(rank, "failed to spawn worker: {e}");
                children.push((rank, None));
            }
        }
    }

    let waits = children.into_iter().map(|(rank, child)| async move {
        let outcome = match child {
            Some(mut child) => match child.wait().await {
                Ok(status) if status.success() => WorkerOutcome::Exited,
                Ok(status) => failed(rank, format!("worker process exited with {status}")),
                Err(e) => failed(rank, format!("waiting on worker process: {e}")),
            },
            None => failed(rank, "worker process could not be spawned".to_string()),
        };
        WorkerReport { rank, outcome }
    });
    Ok(futures::future::join_all(waits).await)
}

fn failed(rank: Rank, reason: String) -> WorkerOutcome {
    WorkerOutcome::Failed {
        during: None,
        error: BenchError::WorkerFailed { rank, reason },
    }
}
