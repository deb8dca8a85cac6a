use super::helpers::run_group;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use topobench::{BenchError, ErrorKind, Message, ProcessGroup};

async fn nobody_passes_early(world: u32) {
    let arrived = Arc::new(AtomicU32::new(0));
    let seen = run_group(world, {
        let arrived = Arc::clone(&arrived);
        move |g| {
            let arrived = Arc::clone(&arrived);
            async move {
                // Stagger arrivals so late ranks are really late.
                tokio::time::sleep(std::time::Duration::from_millis(20 * g.rank() as u64)).await;
                arrived.fetch_add(1, Ordering::SeqCst);
                g.barrier().await.unwrap();
                arrived.load(Ordering::SeqCst)
            }
        }
    })
    .await;
    assert!(seen.iter().all(|&n| n == world), "{seen:?}");
}

#[tokio::test]
async fn test_barrier_4_nodes() {
    nobody_passes_early(4).await;
}

#[tokio::test]
async fn test_barrier_5_nodes_dissemination() {
    nobody_passes_early(5).await;
}

#[tokio::test]
async fn test_barrier_2_nodes_double() {
    run_group(2, |g| async move {
        g.barrier().await.unwrap();
        g.barrier().await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_leave_twice_is_noop() {
    run_group(3, |g| async move {
        g.barrier().await.unwrap();
        g.leave();
        g.leave();
        assert!(g.is_closed());
    })
    .await;
}

#[tokio::test]
async fn test_departed_peer_fails_instead_of_hanging() {
    let groups = ProcessGroup::bootstrap_local(2).await.unwrap();
    groups[1].leave();

    let err = groups[0].recv(1).await.unwrap_err();
    assert!(matches!(err, BenchError::PeerDisconnected { rank: 1 }));
    assert_eq!(err.kind(), ErrorKind::Transport);

    let err = groups[1].send(Message::from_rank(1), 0).await.unwrap_err();
    assert!(matches!(err, BenchError::GroupClosed));
}
