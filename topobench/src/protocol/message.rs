use crate::types::Rank;

/// Frames exchanged between workers.
///
/// Rendezvous and mesh formation use `Hello`/`Welcome`/`Reject`/`PeerHello`;
/// the barrier uses `Barrier`/`BarrierAck`; topology payloads travel as `Data`.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub enum BenchMessage {
    /// Joiner to rank 0: who I am and where my mesh listener is.
    Hello {
        protocol_version: u16,
        rank: Rank,
        world_size: u32,
        mesh_addr: String,
    },

    /// Rank 0 to every joiner once the group is complete.
    /// `(rank, mesh_addr)` for every rank, including rank 0.
    Welcome { peers: Vec<(Rank, String)> },

    /// Rank 0 refusing a joiner (wrong world size, duplicate rank, ...).
    Reject { reason: String },

    /// First frame on a mesh connection, sent by the connecting (higher) rank.
    PeerHello { rank: Rank },

    Barrier { epoch: u64 },

    BarrierAck { epoch: u64 },

    /// A topology payload.
    Data { src_rank: Rank, value: f32 },
}

/// The fixed-shape payload every topology exchanges: one scalar, set to the
/// sender's rank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Message {
    pub value: f32,
}

impl Message {
    pub fn from_rank(rank: Rank) -> Self {
        Self { value: rank as f32 }
    }
}
