pub mod cli;
pub mod compute;
pub mod config;
pub mod device;
pub mod error;
pub mod group;
pub mod protocol;
pub mod record;
pub mod run;
pub mod topology;
pub mod transport;
pub mod types;

pub use compute::{ComputeOutput, run_compute};
pub use config::{BenchConfig, Launcher};
pub use device::{CpuDevice, Device, DeviceKind, open_device};
pub use error::{BenchError, ErrorKind, Result};
pub use group::{ProcessGroup, RendezvousEndpoint};
pub use protocol::{BenchMessage, Message};
pub use record::{EventLog, ResultRecorder, ResultSink, TimingSample};
pub use run::{
    RunSummary, WorkerContext, WorkerOutcome, WorkerReport, WorkerState, execute_run, run_worker,
    select_endpoint,
};
pub use topology::{CommReport, Exchange, run_topology};
pub use types::{Rank, Topology};
