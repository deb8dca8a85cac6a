use crate::device::Device;
use crate::types::{Rank, Topology};
use std::sync::Arc;

/// Lifecycle of one worker within a run.
///
/// `Left` is terminal and is reached from every other state, on success
/// from `Recorded` and on failure from wherever the worker was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    Created,
    Joined,
    Computing,
    BarrierWait,
    Communicating,
    Recorded,
    Left,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Created => "created",
            WorkerState::Joined => "joined",
            WorkerState::Computing => "computing",
            WorkerState::BarrierWait => "barrier_wait",
            WorkerState::Communicating => "communicating",
            WorkerState::Recorded => "recorded",
            WorkerState::Left => "left",
        };
        f.write_str(s)
    }
}

/// Identity and resources of one participant, owned by its worker.
#[derive(Clone)]
pub struct WorkerContext {
    pub rank: Rank,
    pub world_size: u32,
    pub topology: Topology,
    pub device: Arc<dyn Device>,
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("rank", &self.rank)
            .field("world_size", &self.world_size)
            .field("topology", &self.topology)
            .field("device", &self.device.name())
            .finish()
    }
}
