use super::helpers::exchange;
use std::collections::BTreeSet;
use topobench::Topology;

#[tokio::test]
async fn test_star_4_nodes() {
    let ex = exchange(4, Topology::Star).await;

    let hub: BTreeSet<u32> = ex[0].values().iter().map(|v| *v as u32).collect();
    assert_eq!(hub, BTreeSet::from([1, 2, 3]));
    assert_eq!(ex[0].received.len(), 3);
    assert_eq!(ex[0].sent_to, vec![1, 2, 3]);

    for spoke in &ex[1..] {
        assert_eq!(spoke.received, vec![(0, 0.0)]);
        assert_eq!(spoke.sent_to, vec![0]);
    }
}

#[tokio::test]
async fn test_star_hub_receives_in_rank_order() {
    let ex = exchange(5, Topology::Star).await;
    let order: Vec<u32> = ex[0].received.iter().map(|(src, _)| *src).collect();
    assert_eq!(order, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_star_single_node() {
    let ex = exchange(1, Topology::Star).await;
    assert!(ex[0].received.is_empty());
    assert!(ex[0].sent_to.is_empty());
}
