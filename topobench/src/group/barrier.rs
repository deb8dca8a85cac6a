use super::ProcessGroup;
use crate::error::{BenchError, Result};
use crate::protocol::BenchMessage;
use crate::types::Rank;

/// Worlds at or above this size use the dissemination barrier.
const DISSEMINATION_THRESHOLD: u32 = 5;

/// Block until every rank has entered the barrier.
///
/// - two-phase (gather at rank 0, then ack) below the threshold
/// - dissemination (`ceil(log2 N)` symmetric rounds) at or above it
///
/// A peer that leaves mid-barrier surfaces as `PeerDisconnected`.
pub(super) async fn barrier(group: &ProcessGroup) -> Result<()> {
    let world = group.world_size();
    if world <= 1 {
        return Ok(());
    }

    if world < DISSEMINATION_THRESHOLD {
        two_phase_barrier(group).await
    } else {
        dissemination_barrier(group).await
    }
}

async fn two_phase_barrier(group: &ProcessGroup) -> Result<()> {
    let epoch = group.next_barrier_epoch();
    let world = group.world_size();

    if group.rank() == 0 {
        for r in 1..world {
            let msg = group.recv_control(r).await?;
            expect_barrier(msg, r, epoch)?;
        }
        let ack = BenchMessage::BarrierAck { epoch };
        for r in 1..world {
            group.send_control(r, &ack).await?;
        }
    } else {
        group
            .send_control(0, &BenchMessage::Barrier { epoch })
            .await?;
        match group.recv_control(0).await? {
            BenchMessage::BarrierAck { epoch: e } if e == epoch => {}
            other => {
                return Err(BenchError::transport(format!(
                    "barrier: expected BarrierAck(epoch={epoch}) from rank 0, got {other:?}"
                )));
            }
        }
    }

    Ok(())
}

/// In round r, rank i sends to `(i + 2^r) % N` and receives from
/// `(i - 2^r + N) % N`. After `ceil(log2 N)` rounds every rank has
/// transitively heard from every other.
async fn dissemination_barrier(group: &ProcessGroup) -> Result<()> {
    let epoch = group.next_barrier_epoch();
    let rank = group.rank();
    let world = group.world_size();

    let num_rounds = (world as f64).log2().ceil() as u32;

    for round in 0..num_rounds {
        let distance = 1u32 << round;
        let send_to = (rank + distance) % world;
        let recv_from = (rank + world - distance) % world;

        let msg = BenchMessage::Barrier { epoch };
        let send_fut = group.send_control(send_to, &msg);
        let recv_fut = async {
            let received = group.recv_control(recv_from).await?;
            expect_barrier(received, recv_from, epoch)
        };

        let (sent, received) = tokio::join!(send_fut, recv_fut);
        sent?;
        received?;
    }

    Ok(())
}

fn expect_barrier(msg: BenchMessage, from: Rank, epoch: u64) -> Result<()> {
    match msg {
        BenchMessage::Barrier { epoch: e } if e == epoch => Ok(()),
        other => Err(BenchError::transport(format!(
            "barrier: expected Barrier(epoch={epoch}) from rank {from}, got {other:?}"
        ))),
    }
}
