use crate::error::BenchError;

/// Rank of a worker within its group (0-indexed).
pub type Rank = u32;

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// Communication pattern exercised during the timed phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Each rank sends to its successor and receives from its predecessor.
    Ring,
    /// Rank 0 is the hub; every other rank exchanges one message with it.
    Star,
    /// Every rank exchanges one message with every other rank.
    AllToAll,
}

impl Topology {
    pub const ALL: [Topology; 3] = [Topology::Ring, Topology::Star, Topology::AllToAll];

    /// Name used on the command line and in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Topology::Ring => "ring",
            Topology::Star => "star",
            Topology::AllToAll => "all_to_all",
        }
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Topology {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ring" => Ok(Topology::Ring),
            "star" => Ok(Topology::Star),
            "all_to_all" => Ok(Topology::AllToAll),
            other => Err(BenchError::Config(format!(
                "unknown topology {other:?} (expected ring, star or all_to_all)"
            ))),
        }
    }
}
