use crate::types::Rank;

pub type Result<T> = std::result::Result<T, BenchError>;

/// Coarse classification of a failure, used when reporting which phase of a
/// worker's life went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Group join or peer discovery failed.
    Rendezvous,
    /// A send, receive or barrier failed mid-protocol.
    Transport,
    /// The compute device or the workload itself failed.
    Compute,
    /// Invalid configuration, rejected before any worker starts.
    Config,
    /// Launch or join of the workers themselves failed.
    Run,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Rendezvous => f.write_str("RendezvousError"),
            ErrorKind::Transport => f.write_str("TransportError"),
            ErrorKind::Compute => f.write_str("ComputeError"),
            ErrorKind::Config => f.write_str("ConfigError"),
            ErrorKind::Run => f.write_str("RunError"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("rendezvous failed: {reason}")]
    Rendezvous { reason: String },

    #[error("group formation timed out: {joined}/{expected} workers joined")]
    ClusterFormationTimeout { joined: u32, expected: u32 },

    #[error("protocol version mismatch: local={local}, remote={remote}")]
    ProtocolMismatch { local: u16, remote: u16 },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("peer {rank} disconnected unexpectedly")]
    PeerDisconnected { rank: Rank },

    #[error("rank {rank} not found in group")]
    UnknownPeer { rank: Rank },

    #[error("invalid rank {rank}: world size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error("group already left")]
    GroupClosed,

    #[error("message encode failed: {0}")]
    EncodeFailed(String),

    #[error("message decode failed: {0}")]
    DecodeFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device {device} unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error("compute failed: {message}")]
    Compute {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("worker {rank} failed: {reason}")]
    WorkerFailed { rank: Rank, reason: String },

    #[error("run failed: {failed}/{world_size} workers did not complete")]
    RunFailed { failed: u32, world_size: u32 },
}

impl BenchError {
    /// Create a `Transport` error with just a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a `Compute` error with just a message.
    pub fn compute(msg: impl Into<String>) -> Self {
        Self::Compute {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Compute` error with a message and a source error.
    pub fn compute_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Compute {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn rendezvous(reason: impl Into<String>) -> Self {
        Self::Rendezvous {
            reason: reason.into(),
        }
    }

    /// Which of the worker failure classes this error belongs to.
    ///
    /// `Io` is reported as a transport failure: outside of the group the
    /// harness only touches the filesystem through the sinks, and those
    /// errors surface while a worker is already communicating.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BenchError::Rendezvous { .. }
            | BenchError::ClusterFormationTimeout { .. }
            | BenchError::ProtocolMismatch { .. } => ErrorKind::Rendezvous,
            BenchError::Transport { .. }
            | BenchError::PeerDisconnected { .. }
            | BenchError::UnknownPeer { .. }
            | BenchError::InvalidRank { .. }
            | BenchError::GroupClosed
            | BenchError::EncodeFailed(_)
            | BenchError::DecodeFailed(_)
            | BenchError::Io(_) => ErrorKind::Transport,
            BenchError::DeviceUnavailable { .. } | BenchError::Compute { .. } => {
                ErrorKind::Compute
            }
            BenchError::Config(_) => ErrorKind::Config,
            BenchError::WorkerFailed { .. } | BenchError::RunFailed { .. } => ErrorKind::Run,
        }
    }
}
