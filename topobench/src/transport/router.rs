use crate::error::{BenchError, Result};
use crate::protocol::codec::read_message;
use crate::protocol::{BenchMessage, Lane};
use crate::types::Rank;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{Mutex, mpsc};

/// Channel capacity per message lane.
const LANE_CAPACITY: usize = 64;

/// A demultiplexer that runs a single receive loop on one peer's socket and
/// routes incoming frames to per-lane channels.
///
/// # Lanes
///
/// - **`control`** (`Barrier`, `BarrierAck`)
/// - **`data`** (`Data`)
///
/// The loop drains the socket continuously, so a peer's send completes as
/// soon as the frame is written, whether or not a matching receive has been
/// posted here yet. When the socket closes the lanes close too and pending
/// receives fail with `PeerDisconnected` after any buffered frames drain.
pub struct PeerRouter {
    rank: Rank,
    control: Mutex<mpsc::Receiver<BenchMessage>>,
    data: Mutex<mpsc::Receiver<BenchMessage>>,
    handle: tokio::task::JoinHandle<()>,
}

impl PeerRouter {
    /// Spawn a background receive loop for `reader` and return the router.
    pub fn spawn(rank: Rank, reader: OwnedReadHalf) -> Self {
        let (ctrl_tx, ctrl_rx) = mpsc::channel(LANE_CAPACITY);
        let (data_tx, data_rx) = mpsc::channel(LANE_CAPACITY);

        let handle = tokio::spawn(recv_loop(rank, reader, ctrl_tx, data_tx));

        Self {
            rank,
            control: Mutex::new(ctrl_rx),
            data: Mutex::new(data_rx),
            handle,
        }
    }

    /// Receive the next message from the control lane.
    pub async fn recv_control(&self) -> Result<BenchMessage> {
        self.control
            .lock()
            .await
            .recv()
            .await
            .ok_or(BenchError::PeerDisconnected { rank: self.rank })
    }

    /// Receive the next message from the data lane.
    pub async fn recv_data(&self) -> Result<BenchMessage> {
        self.data
            .lock()
            .await
            .recv()
            .await
            .ok_or(BenchError::PeerDisconnected { rank: self.rank })
    }

    /// Stop the receive loop. Frames already routed stay readable.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for PeerRouter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn recv_loop(
    rank: Rank,
    mut reader: OwnedReadHalf,
    control: mpsc::Sender<BenchMessage>,
    data: mpsc::Sender<BenchMessage>,
) {
    loop {
        let (header, msg) = match read_message(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(peer = rank, "peer closed connection");
                return;
            }
            Err(e) => {
                tracing::warn!(peer = rank, "receive loop ended: {e}");
                return;
            }
        };

        let lane = match header.lane {
            Lane::Control => &control,
            Lane::Data => &data,
        };
        if lane.send(msg).await.is_err() {
            // Receiver side dropped: the group is gone.
            return;
        }
    }
}
