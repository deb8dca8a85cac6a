//! The process group: rendezvous, point-to-point messaging and the barrier.

mod barrier;
mod endpoint;
mod rendezvous;

pub use endpoint::RendezvousEndpoint;

use crate::error::{BenchError, Result};
use crate::protocol::{BenchMessage, Lane, Message};
use crate::transport::{PeerConnection, PeerRouter, TransportListener};
use crate::types::Rank;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Membership in one run's group of workers.
///
/// Holds one connection per remote rank (full mesh). Sends complete once the
/// frame is on the socket; receives block until the matching peer's message
/// arrives. Dropping the group leaves it.
pub struct ProcessGroup {
    rank: Rank,
    world_size: u32,
    peers: HashMap<Rank, PeerConnection>,
    routers: HashMap<Rank, PeerRouter>,
    barrier_epoch: AtomicU64,
    closed: AtomicBool,
}

impl ProcessGroup {
    pub(crate) fn from_parts(
        rank: Rank,
        world_size: u32,
        peers: HashMap<Rank, PeerConnection>,
        routers: HashMap<Rank, PeerRouter>,
    ) -> Self {
        Self {
            rank,
            world_size,
            peers,
            routers,
            barrier_epoch: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Join the group at `endpoint` as `rank`.
    ///
    /// Rank 0 binds the endpoint and hosts the rendezvous; every other rank
    /// connects to it, retrying until `timeout` elapses. Fails with a
    /// rendezvous error if the endpoint is unreachable, the host refuses this
    /// rank (already taken, or the group is full), or the group does not form
    /// within `timeout`.
    pub async fn join(
        rank: Rank,
        world_size: u32,
        endpoint: &RendezvousEndpoint,
        timeout: Duration,
    ) -> Result<Self> {
        if world_size == 0 || rank >= world_size {
            return Err(BenchError::rendezvous(format!(
                "rank {rank} outside world of size {world_size}"
            )));
        }
        let addr = endpoint.socket_addr()?;
        if rank == 0 {
            let listener = TransportListener::bind(addr)
                .await
                .map_err(|e| BenchError::rendezvous(format!("cannot host at {endpoint}: {e}")))?;
            rendezvous::host(listener, world_size, timeout).await
        } else {
            rendezvous::join_member(rank, world_size, addr, timeout).await
        }
    }

    /// Host the rendezvous as rank 0 on an already bound listener.
    pub async fn join_with_listener(
        listener: TransportListener,
        world_size: u32,
        timeout: Duration,
    ) -> Result<Self> {
        if world_size == 0 {
            return Err(BenchError::rendezvous("world size must be at least 1"));
        }
        rendezvous::host(listener, world_size, timeout).await
    }

    /// Form a complete group of `world_size` ranks inside this process on an
    /// ephemeral loopback port. Returned in rank order.
    pub async fn bootstrap_local(world_size: u32) -> Result<Vec<ProcessGroup>> {
        const TIMEOUT: Duration = Duration::from_secs(30);

        let listener = TransportListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let endpoint = RendezvousEndpoint::from(listener.local_addr());

        let host = tokio::spawn(Self::join_with_listener(listener, world_size, TIMEOUT));
        let mut members = Vec::new();
        for rank in 1..world_size {
            let endpoint = endpoint.clone();
            members.push(tokio::spawn(async move {
                Self::join(rank, world_size, &endpoint, TIMEOUT).await
            }));
        }

        let mut groups = vec![
            host.await
                .map_err(|e| BenchError::transport_with_source("rank 0 task panicked", e))??,
        ];
        for h in members {
            groups.push(
                h.await
                    .map_err(|e| BenchError::transport_with_source("member task panicked", e))??,
            );
        }
        Ok(groups)
    }

    /// This worker's rank (0-indexed).
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Number of workers in the group.
    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    /// Whether [`leave`](Self::leave) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(BenchError::GroupClosed);
        }
        Ok(())
    }

    fn check_peer(&self, rank: Rank) -> Result<()> {
        if rank >= self.world_size || rank == self.rank {
            return Err(BenchError::InvalidRank {
                rank,
                world_size: self.world_size,
            });
        }
        Ok(())
    }

    pub(crate) fn peer(&self, rank: Rank) -> Result<&PeerConnection> {
        self.check_peer(rank)?;
        self.peers.get(&rank).ok_or(BenchError::UnknownPeer { rank })
    }

    fn router(&self, rank: Rank) -> Result<&PeerRouter> {
        self.check_peer(rank)?;
        self.routers.get(&rank).ok_or(BenchError::UnknownPeer { rank })
    }

    /// Send `msg` to `dst`.
    pub async fn send(&self, msg: Message, dst: Rank) -> Result<()> {
        self.ensure_open()?;
        let data = BenchMessage::Data {
            src_rank: self.rank,
            value: msg.value,
        };
        self.peer(dst)?.send_message(&data, Lane::Data).await
    }

    /// Block until the next message from `src` arrives.
    pub async fn recv(&self, src: Rank) -> Result<Message> {
        self.ensure_open()?;
        match self.router(src)?.recv_data().await? {
            BenchMessage::Data { src_rank, value } if src_rank == src => Ok(Message { value }),
            other => Err(BenchError::DecodeFailed(format!(
                "expected Data from rank {src}, got {other:?}"
            ))),
        }
    }

    /// Block until every rank in the group has called `barrier`.
    pub async fn barrier(&self) -> Result<()> {
        self.ensure_open()?;
        barrier::barrier(self).await
    }

    pub(crate) fn next_barrier_epoch(&self) -> u64 {
        self.barrier_epoch.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) async fn send_control(&self, dst: Rank, msg: &BenchMessage) -> Result<()> {
        self.peer(dst)?.send_message(msg, Lane::Control).await
    }

    pub(crate) async fn recv_control(&self, src: Rank) -> Result<BenchMessage> {
        self.router(src)?.recv_control().await
    }

    /// Leave the group: close every outbound connection and stop every
    /// receive loop. Idempotent; later calls do nothing. Any operation after
    /// leaving fails with `GroupClosed`.
    pub fn leave(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for peer in self.peers.values() {
            if !peer.close() {
                tracing::debug!(rank = self.rank, peer = peer.rank, "send in flight at leave");
            }
        }
        for router in self.routers.values() {
            router.abort();
        }
        tracing::debug!(rank = self.rank, "left group");
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.leave();
    }
}

impl std::fmt::Debug for ProcessGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessGroup")
            .field("rank", &self.rank)
            .field("world_size", &self.world_size)
            .field("closed", &self.is_closed())
            .finish()
    }
}
