use super::endpoint::select_endpoint;
use super::process;
use super::worker::{WorkerOutcome, WorkerReport, run_host_worker, run_worker};
use crate::config::{BenchConfig, Launcher};
use crate::error::{BenchError, Result};
use crate::group::RendezvousEndpoint;
use crate::record::ResultRecorder;
use crate::transport::TransportListener;
use crate::types::Rank;
use std::sync::Arc;

/// Per-rank outcomes of one run.
#[derive(Debug)]
pub struct RunSummary {
    pub endpoint: RendezvousEndpoint,
    pub world_size: u32,
    /// One report per rank, in rank order.
    pub reports: Vec<WorkerReport>,
}

impl RunSummary {
    /// True only if every rank finished on the success path.
    pub fn is_success(&self) -> bool {
        self.reports.len() == self.world_size as usize
            && self.reports.iter().all(WorkerReport::is_success)
    }

    pub fn failed_ranks(&self) -> Vec<Rank> {
        self.reports
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.rank)
            .collect()
    }

    /// `Err(RunFailed)` unless the run succeeded.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(BenchError::RunFailed {
                failed: self.failed_ranks().len() as u32,
                world_size: self.world_size,
            })
        }
    }
}

/// Run one benchmark: clear the sinks, pick the rendezvous endpoint, start
/// one worker per rank and wait for every one of them.
///
/// A failing worker does not cancel its siblings; they finish or fail on
/// their own. Errors returned here are setup failures before any worker
/// started. Worker failures are reported in the summary.
pub async fn execute_run(config: &BenchConfig) -> Result<RunSummary> {
    config.validate()?;

    let recorder = Arc::new(ResultRecorder::new(&config.log_path, &config.csv_path));
    recorder.reset()?;

    let (endpoint, listener) = select_endpoint(config).await?;
    recorder.log(format!("Using dynamic port: {}", endpoint.port))?;
    tracing::info!(
        world_size = config.world_size,
        matrix_size = config.matrix_size,
        topology = %config.topology,
        launcher = %config.launcher,
        %endpoint,
        "starting run"
    );

    let mut reports = match config.launcher {
        Launcher::Tasks => launch_tasks(config, &endpoint, listener, &recorder).await,
        Launcher::Processes => {
            // Rank 0 rebinds the port in its own process.
            drop(listener);
            recorder.sink().ensure_header()?;
            process::launch(config, &endpoint).await?
        }
    };
    reports.sort_by_key(|r| r.rank);

    let summary = RunSummary {
        endpoint,
        world_size: config.world_size,
        reports,
    };
    if summary.is_success() {
        tracing::info!("run complete: {} workers succeeded", summary.world_size);
    } else {
        tracing::error!(failed = ?summary.failed_ranks(), "run failed");
    }
    Ok(summary)
}

async fn launch_tasks(
    config: &BenchConfig,
    endpoint: &RendezvousEndpoint,
    listener: TransportListener,
    recorder: &Arc<ResultRecorder>,
) -> Vec<WorkerReport> {
    let config = Arc::new(config.clone());
    let mut handles = Vec::with_capacity(config.world_size as usize);

    {
        let config = Arc::clone(&config);
        let recorder = Arc::clone(recorder);
        handles.push((
            0,
            tokio::spawn(async move { run_host_worker(listener, &config, &recorder).await }),
        ));
    }
    for rank in 1..config.world_size {
        let config = Arc::clone(&config);
        let recorder = Arc::clone(recorder);
        let endpoint = endpoint.clone();
        handles.push((
            rank,
            tokio::spawn(async move { run_worker(rank, &endpoint, &config, &recorder).await }),
        ));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for (rank, handle) in handles {
        let report = handle.await.unwrap_or_else(|e| {
            tracing::error!(rank, "worker task aborted: {e}");
            WorkerReport {
                rank,
                outcome: WorkerOutcome::Failed {
                    during: None,
                    error: BenchError::WorkerFailed {
                        rank,
                        reason: format!("task aborted: {e}"),
                    },
                },
            }
        });
        reports.push(report);
    }
    reports
}
