use std::path::Path;
use std::sync::Arc;
use topobench::{
    BenchConfig, CpuDevice, Exchange, ProcessGroup, Topology, WorkerContext, run_topology,
};

/// Run `f` for every rank of a freshly bootstrapped local group, concurrently.
/// Returns the per-rank results in rank order. Keeps every group alive until
/// all tasks complete.
pub async fn run_group<F, Fut, T>(world_size: u32, f: F) -> Vec<T>
where
    F: Fn(Arc<ProcessGroup>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let groups = ProcessGroup::bootstrap_local(world_size).await.unwrap();
    let groups: Vec<Arc<ProcessGroup>> = groups.into_iter().map(Arc::new).collect();

    let f = Arc::new(f);
    let mut handles = Vec::new();
    for g in &groups {
        let g = Arc::clone(g);
        let f = Arc::clone(&f);
        handles.push(tokio::spawn(async move { f(g).await }));
    }
    let mut out = Vec::new();
    for h in handles {
        out.push(h.await.unwrap());
    }
    out
}

pub fn cpu_context(group: &ProcessGroup, topology: Topology) -> WorkerContext {
    WorkerContext {
        rank: group.rank(),
        world_size: group.world_size(),
        topology,
        device: Arc::new(CpuDevice::new()),
    }
}

/// Run `topology` on a local group and return every rank's exchange.
pub async fn exchange(world_size: u32, topology: Topology) -> Vec<Exchange> {
    run_group(world_size, move |g| async move {
        let ctx = cpu_context(&g, topology);
        run_topology(topology, &ctx, &g).await.unwrap().exchange
    })
    .await
}

/// Small, seeded, in-process run writing its sinks under `dir`.
pub fn test_config(dir: &Path, world_size: u32, topology: Topology) -> BenchConfig {
    BenchConfig {
        world_size,
        matrix_size: 16,
        topology,
        seed: Some(7),
        log_path: dir.join("log.txt"),
        csv_path: dir.join("tiempos.csv"),
        ..Default::default()
    }
}
