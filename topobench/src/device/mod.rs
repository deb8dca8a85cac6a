//! Compute targets.

mod adapter;
mod cpu;

pub use adapter::Device;
pub use cpu::CpuDevice;

use crate::error::{BenchError, Result};
use crate::types::Rank;
use std::sync::Arc;

/// Which kind of device a worker computes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceKind {
    #[default]
    Cpu,
    Cuda,
}

impl std::str::FromStr for DeviceKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cpu" => Ok(DeviceKind::Cpu),
            "cuda" => Ok(DeviceKind::Cuda),
            other => Err(BenchError::Config(format!(
                "unknown device {other:?} (expected cpu or cuda)"
            ))),
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Cpu => f.write_str("cpu"),
            DeviceKind::Cuda => f.write_str("cuda"),
        }
    }
}

/// Open the device `rank` computes on.
///
/// Every rank shares device index 0, so on a single accelerator all
/// workers contend for the same card.
pub fn open_device(kind: DeviceKind, rank: Rank) -> Result<Arc<dyn Device>> {
    match kind {
        DeviceKind::Cpu => Ok(Arc::new(CpuDevice::new())),
        DeviceKind::Cuda => Err(BenchError::DeviceUnavailable {
            device: "cuda:0".to_string(),
            reason: format!("rank {rank}: no accelerator backend compiled into this build"),
        }),
    }
}
