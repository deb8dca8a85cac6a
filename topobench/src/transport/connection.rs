use crate::error::{BenchError, Result};
use crate::protocol::codec::write_message;
use crate::protocol::{BenchMessage, Lane};
use crate::types::Rank;
use std::net::SocketAddr;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

/// The sending half of a connection to a single peer.
///
/// All receiving is done by [`PeerRouter`](super::PeerRouter), which owns the
/// read half and demultiplexes incoming frames into lanes.
pub struct PeerConnection {
    pub rank: Rank,
    writer: Mutex<Option<OwnedWriteHalf>>,
    remote_addr: SocketAddr,
}

impl PeerConnection {
    pub fn new(rank: Rank, writer: OwnedWriteHalf, remote_addr: SocketAddr) -> Self {
        Self {
            rank,
            writer: Mutex::new(Some(writer)),
            remote_addr,
        }
    }

    /// Send one message on the given lane. Completes once the frame is handed
    /// to the socket; it does not wait for the peer to receive it.
    pub async fn send_message(&self, msg: &BenchMessage, lane: Lane) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(BenchError::GroupClosed)?;
        write_message(writer, msg, lane)
            .await
            .map_err(|e| match e {
                BenchError::Transport { source, .. } => BenchError::Transport {
                    message: format!("send to rank {}", self.rank),
                    source,
                },
                other => other,
            })
    }

    /// Drop the write half, which shuts down our direction of the socket so
    /// the peer's router observes end-of-stream.
    ///
    /// Returns `false` if a send currently holds the writer; the half is then
    /// released when this connection is dropped.
    pub fn close(&self) -> bool {
        match self.writer.try_lock() {
            Ok(mut guard) => {
                guard.take();
                true
            }
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for PeerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnection")
            .field("rank", &self.rank)
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}
