//! Group formation.
//!
//! Rank 0 listens on the rendezvous endpoint and collects one `Hello` per
//! other rank. Once every rank has checked in it answers each with a
//! `Welcome` carrying the mesh address of every rank. The ranks then build a
//! full mesh: for every pair `i < j`, rank `j` connects to rank `i`'s mesh
//! listener and names itself with `PeerHello`.

use super::ProcessGroup;
use crate::error::{BenchError, Result};
use crate::protocol::codec::{expect_message, write_message};
use crate::protocol::{BenchMessage, Lane};
use crate::transport::{PeerConnection, PeerRouter, TransportListener, connect_with_retry};
use crate::types::{PROTOCOL_VERSION, Rank};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// How long a rendezvous connection may stay silent before it is dropped.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Host the rendezvous as rank 0.
pub(super) async fn host(
    rendezvous: TransportListener,
    world_size: u32,
    timeout: Duration,
) -> Result<ProcessGroup> {
    let deadline = Instant::now() + timeout;
    let advertise_ip = advertised_ip(rendezvous.local_addr().ip());
    let mesh = bind_mesh_listener(advertise_ip).await?;
    let mesh_addr = SocketAddr::new(advertise_ip, mesh.local_addr().port());

    tracing::info!(
        endpoint = %rendezvous.local_addr(),
        world_size,
        "hosting rendezvous"
    );

    let mut table: HashMap<Rank, String> = HashMap::new();
    table.insert(0, mesh_addr.to_string());
    let mut joined: Vec<(Rank, TcpStream)> = Vec::new();

    // Handshakes run concurrently, so a connection that never speaks cannot
    // hold up the joiners behind it.
    let mut handshakes = FuturesUnordered::new();

    while (joined.len() as u32) + 1 < world_size {
        tokio::select! {
            accepted = rendezvous.accept() => match accepted {
                Ok((stream, remote)) => handshakes.push(read_hello(stream, remote)),
                Err(e) => tracing::warn!("rendezvous accept failed: {e}"),
            },
            Some((mut stream, remote, hello)) = handshakes.next(), if !handshakes.is_empty() => {
                let hello = match hello {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::warn!(%remote, "dropping joiner: {e}");
                        continue;
                    }
                };
                match admit(&hello, world_size, &table) {
                    Ok((rank, addr)) => {
                        table.insert(rank, addr);
                        joined.push((rank, stream));
                        tracing::info!(
                            "worker joined: rank={rank}, total={}/{world_size}",
                            joined.len() + 1
                        );
                    }
                    Err(reason) => {
                        tracing::warn!(%remote, "rejecting joiner: {reason}");
                        let reject = BenchMessage::Reject { reason };
                        if let Err(e) = write_message(&mut stream, &reject, Lane::Control).await {
                            tracing::debug!(%remote, "could not deliver reject: {e}");
                        }
                    }
                }
            },
            _ = tokio::time::sleep_until(deadline) => {
                return Err(BenchError::ClusterFormationTimeout {
                    joined: joined.len() as u32 + 1,
                    expected: world_size,
                });
            }
        }
    }

    let mut peers: Vec<(Rank, String)> = table.into_iter().collect();
    peers.sort_by_key(|(rank, _)| *rank);

    let welcome = BenchMessage::Welcome {
        peers: peers.clone(),
    };
    for (rank, stream) in &mut joined {
        write_message(stream, &welcome, Lane::Control)
            .await
            .map_err(|e| BenchError::rendezvous(format!("send welcome to rank {rank}: {e}")))?;
    }

    build_mesh(0, world_size, &peers, mesh, deadline).await
}

/// Read the first frame of a rendezvous connection, giving up after
/// `HANDSHAKE_TIMEOUT`.
async fn read_hello(
    mut stream: TcpStream,
    remote: SocketAddr,
) -> (TcpStream, SocketAddr, Result<BenchMessage>) {
    let hello = tokio::time::timeout(HANDSHAKE_TIMEOUT, expect_message(&mut stream, "Hello"))
        .await
        .unwrap_or_else(|_| {
            Err(BenchError::rendezvous(format!(
                "no Hello within {HANDSHAKE_TIMEOUT:?}"
            )))
        });
    (stream, remote, hello)
}

/// Check a `Hello` against the group so far. Returns the joiner's rank and
/// mesh address, or the reason it is refused.
fn admit(
    hello: &BenchMessage,
    world_size: u32,
    table: &HashMap<Rank, String>,
) -> std::result::Result<(Rank, String), String> {
    match hello {
        BenchMessage::Hello {
            protocol_version,
            rank,
            world_size: theirs,
            mesh_addr,
        } => {
            if *protocol_version != PROTOCOL_VERSION {
                return Err(BenchError::ProtocolMismatch {
                    local: PROTOCOL_VERSION,
                    remote: *protocol_version,
                }
                .to_string());
            }
            if *theirs != world_size {
                return Err(format!(
                    "world size mismatch: group has {world_size}, joiner expects {theirs}"
                ));
            }
            if *rank == 0 || *rank >= world_size {
                return Err(format!("rank {rank} not joinable in world of {world_size}"));
            }
            if table.contains_key(rank) {
                return Err(format!("rank {rank} already joined"));
            }
            Ok((*rank, mesh_addr.clone()))
        }
        other => Err(format!("expected Hello, got {other:?}")),
    }
}

/// Join the rendezvous hosted by rank 0 at `addr`.
pub(super) async fn join_member(
    rank: Rank,
    world_size: u32,
    addr: SocketAddr,
    timeout: Duration,
) -> Result<ProcessGroup> {
    let deadline = Instant::now() + timeout;
    let mesh = bind_mesh_listener(advertised_ip(addr.ip())).await?;

    let mut stream = connect_with_retry(addr, timeout).await?;
    let local_ip = stream
        .local_addr()
        .map_err(|e| BenchError::transport_with_source("rendezvous local_addr", e))?
        .ip();
    let mesh_addr = SocketAddr::new(local_ip, mesh.local_addr().port());

    let hello = BenchMessage::Hello {
        protocol_version: PROTOCOL_VERSION,
        rank,
        world_size,
        mesh_addr: mesh_addr.to_string(),
    };
    write_message(&mut stream, &hello, Lane::Control)
        .await
        .map_err(|e| BenchError::rendezvous(format!("send hello: {e}")))?;

    let reply = tokio::time::timeout_at(deadline, expect_message(&mut stream, "Welcome"))
        .await
        .map_err(|_| BenchError::rendezvous(format!("no welcome from {addr} within {timeout:?}")))?
        .map_err(|e| BenchError::rendezvous(format!("rendezvous at {addr}: {e}")))?;

    let peers = match reply {
        BenchMessage::Welcome { peers } => peers,
        BenchMessage::Reject { reason } => {
            return Err(BenchError::rendezvous(format!("rejected by {addr}: {reason}")));
        }
        other => {
            return Err(BenchError::rendezvous(format!(
                "expected Welcome, got {other:?}"
            )));
        }
    };
    if peers.len() != world_size as usize {
        return Err(BenchError::rendezvous(format!(
            "peer table lists {} ranks, expected {world_size}",
            peers.len()
        )));
    }
    tracing::debug!(rank, "welcomed into group of {world_size}");

    build_mesh(rank, world_size, &peers, mesh, deadline).await
}

/// Connect to every lower rank and accept every higher rank.
async fn build_mesh(
    rank: Rank,
    world_size: u32,
    peers: &[(Rank, String)],
    mesh: TransportListener,
    deadline: Instant,
) -> Result<ProcessGroup> {
    let mut addrs: HashMap<Rank, SocketAddr> = HashMap::new();
    for (r, addr) in peers {
        let parsed: SocketAddr = addr
            .parse()
            .map_err(|e| BenchError::rendezvous(format!("bad mesh address {addr:?} for rank {r}: {e}")))?;
        addrs.insert(*r, parsed);
    }

    let connect_lower = futures::future::try_join_all((0..rank).map(|lower| {
        let addr = addrs.get(&lower).copied();
        async move {
            let addr = addr.ok_or_else(|| {
                BenchError::rendezvous(format!("no mesh address for rank {lower}"))
            })?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let mut stream = connect_with_retry(addr, remaining).await?;
            write_message(&mut stream, &BenchMessage::PeerHello { rank }, Lane::Control).await?;
            Ok::<_, BenchError>((lower, stream))
        }
    }));

    let accept_higher = async {
        let expected = (world_size - 1 - rank) as usize;
        let mut accepted: Vec<(Rank, TcpStream)> = Vec::with_capacity(expected);
        while accepted.len() < expected {
            let (mut stream, remote) = mesh.accept().await?;
            match expect_message(&mut stream, "PeerHello").await? {
                BenchMessage::PeerHello { rank: higher }
                    if higher > rank
                        && higher < world_size
                        && !accepted.iter().any(|(r, _)| *r == higher) =>
                {
                    accepted.push((higher, stream));
                }
                other => {
                    tracing::warn!(%remote, "unexpected mesh handshake: {other:?}");
                }
            }
        }
        Ok::<_, BenchError>(accepted)
    };

    let (lower, higher) = tokio::time::timeout_at(deadline, async {
        tokio::try_join!(connect_lower, accept_higher)
    })
    .await
    .map_err(|_| BenchError::rendezvous(format!("rank {rank}: mesh formation timed out")))??;

    let mut conns = HashMap::new();
    let mut routers = HashMap::new();
    for (peer_rank, stream) in lower.into_iter().chain(higher) {
        let remote = stream
            .peer_addr()
            .map_err(|e| BenchError::transport_with_source("mesh peer_addr", e))?;
        let (reader, writer) = stream.into_split();
        conns.insert(peer_rank, PeerConnection::new(peer_rank, writer, remote));
        routers.insert(peer_rank, PeerRouter::spawn(peer_rank, reader));
    }

    tracing::debug!(rank, peers = conns.len(), "mesh established");
    Ok(ProcessGroup::from_parts(rank, world_size, conns, routers))
}

/// The address peers should dial: unspecified binds are advertised as
/// loopback of the same family.
fn advertised_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        other => other,
    }
}

async fn bind_mesh_listener(ip: IpAddr) -> Result<TransportListener> {
    let bind_ip = if ip.is_loopback() {
        ip
    } else if ip.is_ipv4() {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        IpAddr::V6(Ipv6Addr::UNSPECIFIED)
    };
    TransportListener::bind(SocketAddr::new(bind_ip, 0))
        .await
        .map_err(|e| BenchError::rendezvous(format!("bind mesh listener: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::group::RendezvousEndpoint;

    fn hello(rank: Rank, world_size: u32) -> BenchMessage {
        BenchMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
            rank,
            world_size,
            mesh_addr: "127.0.0.1:1".into(),
        }
    }

    #[test]
    fn test_admit_rules() {
        let mut table = HashMap::new();
        table.insert(0, "127.0.0.1:1".to_string());

        assert_eq!(admit(&hello(1, 3), 3, &table).unwrap().0, 1);
        assert!(admit(&hello(0, 3), 3, &table).unwrap_err().contains("not joinable"));
        assert!(admit(&hello(3, 3), 3, &table).is_err());
        assert!(admit(&hello(1, 4), 3, &table).unwrap_err().contains("world size"));

        table.insert(1, "127.0.0.1:2".to_string());
        assert!(admit(&hello(1, 3), 3, &table).unwrap_err().contains("already joined"));

        let old = BenchMessage::Hello {
            protocol_version: PROTOCOL_VERSION + 1,
            rank: 2,
            world_size: 3,
            mesh_addr: String::new(),
        };
        assert!(admit(&old, 3, &table).unwrap_err().contains("protocol"));
        assert!(admit(&BenchMessage::Barrier { epoch: 0 }, 3, &table).is_err());
    }

    #[test]
    fn test_advertised_ip() {
        assert_eq!(
            advertised_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        let ip: IpAddr = "10.1.2.3".parse().unwrap();
        assert_eq!(advertised_ip(ip), ip);
    }

    #[tokio::test]
    async fn test_duplicate_rank_is_rejected() {
        let listener = TransportListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let endpoint = RendezvousEndpoint::from(listener.local_addr());
        let timeout = Duration::from_secs(10);

        let host = tokio::spawn(host(listener, 3, timeout));
        let first = ProcessGroup::join(1, 3, &endpoint, timeout);
        // Give the first joiner a head start so it claims rank 1.
        let dup = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            ProcessGroup::join(1, 3, &endpoint, timeout).await
        };
        let third = async {
            tokio::time::sleep(Duration::from_millis(400)).await;
            ProcessGroup::join(2, 3, &endpoint, timeout).await
        };
        let (first, dup, third) = tokio::join!(first, dup, third);

        let err = dup.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rendezvous);
        assert!(err.to_string().contains("already joined"), "got: {err}");

        let first = first.unwrap();
        let third = third.unwrap();
        let zero = host.await.unwrap().unwrap();
        assert_eq!(first.rank(), 1);
        assert_eq!(third.rank(), 2);
        assert_eq!(zero.rank(), 0);
    }

    #[tokio::test]
    async fn test_silent_connection_does_not_block_joiners() {
        let listener = TransportListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr();
        let endpoint = RendezvousEndpoint::from(addr);
        let timeout = Duration::from_secs(3);

        let host = tokio::spawn(host(listener, 2, timeout));
        // Connects first and never sends a frame.
        let _silent = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let member = ProcessGroup::join(1, 2, &endpoint, timeout).await.unwrap();
        let zero = host.await.unwrap().unwrap();
        assert_eq!(member.rank(), 1);
        assert_eq!(zero.world_size(), 2);
    }

    #[tokio::test]
    async fn test_formation_timeout() {
        let listener = TransportListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let err = host(listener, 2, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BenchError::ClusterFormationTimeout {
                joined: 1,
                expected: 2
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Rendezvous);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let addr = {
            let l = TransportListener::bind("127.0.0.1:0".parse().unwrap())
                .await
                .unwrap();
            l.local_addr()
        };
        let err = join_member(1, 2, addr, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rendezvous);
    }
}
