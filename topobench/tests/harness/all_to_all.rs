use super::helpers::exchange;
use topobench::Topology;

#[tokio::test]
async fn test_all_to_all_4_nodes() {
    let ex = exchange(4, Topology::AllToAll).await;
    for (rank, e) in ex.iter().enumerate() {
        let rank = rank as u32;
        let others: Vec<u32> = (0..4).filter(|&r| r != rank).collect();
        assert_eq!(e.sent_to, others);
        let expected: Vec<(u32, f32)> = others.iter().map(|&r| (r, r as f32)).collect();
        assert_eq!(e.received, expected);
    }
}

#[tokio::test]
async fn test_all_to_all_5_nodes() {
    // Five ranks also exercises the dissemination barrier.
    let ex = exchange(5, Topology::AllToAll).await;
    for e in &ex {
        assert_eq!(e.received.len(), 4);
    }
}

#[tokio::test]
async fn test_all_to_all_single_node() {
    let ex = exchange(1, Topology::AllToAll).await;
    assert!(ex[0].sent_to.is_empty());
    assert!(ex[0].received.is_empty());
}
