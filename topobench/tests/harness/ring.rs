use super::helpers::exchange;
use topobench::Topology;

#[tokio::test]
async fn test_ring_3_nodes_receives_prev_rank() {
    let ex = exchange(3, Topology::Ring).await;
    assert_eq!(ex[0].received, vec![(2, 2.0)]);
    assert_eq!(ex[1].received, vec![(0, 0.0)]);
    assert_eq!(ex[2].received, vec![(1, 1.0)]);
}

#[tokio::test]
async fn test_ring_4_nodes_sends_to_next() {
    let ex = exchange(4, Topology::Ring).await;
    for (rank, e) in ex.iter().enumerate() {
        let rank = rank as u32;
        let prev = (rank + 3) % 4;
        assert_eq!(e.sent_to, vec![(rank + 1) % 4]);
        assert_eq!(e.received, vec![(prev, prev as f32)]);
    }
}

#[tokio::test]
async fn test_ring_repeated_rounds() {
    // Back-to-back rounds on one group must not cross-deliver.
    let rounds = super::helpers::run_group(3, |g| async move {
        let ctx = super::helpers::cpu_context(&g, Topology::Ring);
        let mut values = Vec::new();
        for _ in 0..3 {
            let report = topobench::run_topology(Topology::Ring, &ctx, &g).await.unwrap();
            values.extend(report.exchange.values());
        }
        values
    })
    .await;
    assert_eq!(rounds[0], vec![2.0; 3]);
    assert_eq!(rounds[1], vec![0.0; 3]);
    assert_eq!(rounds[2], vec![1.0; 3]);
}
