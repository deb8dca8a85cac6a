//! Run coordination: endpoint selection, worker launch, teardown and the
//! per-rank state machine.

mod context;
mod coordinator;
mod endpoint;
mod process;
mod worker;

pub use context::{WorkerContext, WorkerState};
pub use coordinator::{RunSummary, execute_run};
pub use endpoint::select_endpoint;
pub use worker::{WorkerOutcome, WorkerOutput, WorkerReport, run_host_worker, run_worker};
