use super::helpers::test_config;
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use topobench::record::CSV_HEADER;
use topobench::run::run_host_worker;
use topobench::transport::TransportListener;
use topobench::{
    BenchError, DeviceKind, ErrorKind, ProcessGroup, RendezvousEndpoint, ResultRecorder,
    RunSummary, Topology, WorkerOutcome, WorkerState, execute_run,
};

fn csv_rows(path: &Path) -> Vec<Vec<String>> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let header: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header, CSV_HEADER);
    rdr.records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect()
}

/// Every in-process rank completed and its total is compute plus comm.
fn assert_totals(summary: &RunSummary) {
    assert!(summary.is_success(), "{summary:?}");
    for report in &summary.reports {
        let s = report.output().unwrap().sample;
        assert_eq!(s.rank(), report.rank);
        assert_eq!(s.total_seconds(), s.compute_seconds() + s.comm_seconds());
    }
}

fn run_binary(dir: &Path, extra: &[&str]) -> std::process::ExitStatus {
    Command::new(env!("CARGO_BIN_EXE_topobench"))
        .args(["--launcher", "processes", "--world-size", "3"])
        .args(["--matrix-size", "16", "--seed", "7"])
        .arg("--csv-path")
        .arg(dir.join("tiempos.csv"))
        .arg("--log-path")
        .arg(dir.join("log.txt"))
        .args(extra)
        .status()
        .unwrap()
}

#[tokio::test]
async fn test_ring_run_records_every_rank() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 3, Topology::Ring);

    let summary = execute_run(&config).await.unwrap();
    assert!(summary.is_success(), "{summary:?}");
    assert!(config.port_range.contains(&summary.endpoint.port));

    for report in &summary.reports {
        let out = report.output().unwrap();
        let s = out.sample;
        assert_eq!(s.rank(), report.rank);
        assert_eq!(s.total_seconds(), s.compute_seconds() + s.comm_seconds());
        let prev = (report.rank + 2) % 3;
        assert_eq!(out.exchange.received, vec![(prev, prev as f32)]);
    }

    let rows = csv_rows(&config.csv_path);
    let ranks: BTreeSet<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(ranks, BTreeSet::from(["0", "1", "2"]));

    let log = std::fs::read_to_string(&config.log_path).unwrap();
    assert!(log.contains("Using dynamic port:"));
    assert!(log.contains("[Rank 0] Received from Rank 2: 2.0"));
    assert_eq!(log.matches("Times -> Compute:").count(), 3);
    assert_eq!(
        log.matches("Finalizing process and releasing resources.").count(),
        3
    );
}

#[tokio::test]
async fn test_second_run_clears_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 2, Topology::AllToAll);

    execute_run(&config).await.unwrap().into_result().unwrap();
    let summary = execute_run(&config).await.unwrap().into_result().unwrap();
    assert_totals(&summary);

    let text = std::fs::read_to_string(&config.csv_path).unwrap();
    assert_eq!(text.matches("rank,compute_time,comm_time,total_time").count(), 1);
    assert_eq!(csv_rows(&config.csv_path).len(), 2);

    let log = std::fs::read_to_string(&config.log_path).unwrap();
    assert_eq!(log.matches("Using dynamic port:").count(), 1);
}

#[tokio::test]
async fn test_star_run_hub_receives_every_spoke() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 4, Topology::Star);

    let summary = execute_run(&config).await.unwrap();
    assert_totals(&summary);

    let hub = summary.reports[0].output().unwrap();
    let values: BTreeSet<u32> = hub.exchange.values().iter().map(|v| *v as u32).collect();
    assert_eq!(values, BTreeSet::from([1, 2, 3]));
    for spoke in &summary.reports[1..] {
        assert_eq!(spoke.output().unwrap().exchange.values(), vec![0.0]);
    }
}

#[tokio::test]
async fn test_single_worker_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 1, Topology::Ring);
    let summary = execute_run(&config).await.unwrap();
    assert!(summary.is_success());
    assert_eq!(csv_rows(&config.csv_path).len(), 1);
}

#[tokio::test]
async fn test_unavailable_device_fails_run_without_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), 2, Topology::Ring);
    config.device = DeviceKind::Cuda;

    let summary = execute_run(&config).await.unwrap();
    assert!(!summary.is_success());
    assert_eq!(summary.failed_ranks(), vec![0, 1]);
    for report in &summary.reports {
        match &report.outcome {
            WorkerOutcome::Failed { during, error } => {
                assert_eq!(*during, Some(WorkerState::Joined));
                assert_eq!(error.kind(), ErrorKind::Compute);
            }
            other => panic!("rank {} should have failed: {other:?}", report.rank),
        }
    }

    // Cleared at run start and no sample was produced.
    assert_eq!(std::fs::read_to_string(&config.csv_path).unwrap(), "");
    let log = std::fs::read_to_string(&config.log_path).unwrap();
    assert!(log.contains("[Rank 1] Failed with ComputeError"));
    assert_eq!(
        log.matches("Finalizing process and releasing resources.").count(),
        2
    );

    let err = summary.into_result().unwrap_err();
    assert!(matches!(
        err,
        BenchError::RunFailed {
            failed: 2,
            world_size: 2
        }
    ));
}

#[tokio::test]
async fn test_invalid_config_rejected_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), 2, Topology::Ring);
    config.matrix_size = 0;
    let err = execute_run(&config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(!config.csv_path.exists());
}

#[tokio::test]
async fn test_all_to_all_run_every_rank_hears_every_peer() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 3, Topology::AllToAll);

    let summary = execute_run(&config).await.unwrap();
    assert_totals(&summary);
    for report in &summary.reports {
        let senders: BTreeSet<u32> = report
            .output()
            .unwrap()
            .exchange
            .received
            .iter()
            .map(|(src, _)| *src)
            .collect();
        let expected: BTreeSet<u32> = (0..3).filter(|r| *r != report.rank).collect();
        assert_eq!(senders, expected);
    }
    assert_eq!(csv_rows(&config.csv_path).len(), 3);
}

#[tokio::test]
async fn test_peer_leaving_fails_rank_while_communicating() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 2, Topology::Ring);
    let recorder = ResultRecorder::new(&config.log_path, &config.csv_path);
    recorder.reset().unwrap();

    let listener = TransportListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let endpoint = RendezvousEndpoint::from(listener.local_addr());
    let timeout = Duration::from_secs(10);

    // Rank 1 takes part in the barrier, then goes away instead of exchanging.
    let peer = async {
        let group = ProcessGroup::join(1, 2, &endpoint, timeout).await.unwrap();
        group.barrier().await.unwrap();
        group.leave();
    };
    let (report, ()) = tokio::join!(run_host_worker(listener, &config, &recorder), peer);

    match &report.outcome {
        WorkerOutcome::Failed { during, error } => {
            assert_eq!(*during, Some(WorkerState::Communicating));
            assert_eq!(error.kind(), ErrorKind::Transport);
        }
        other => panic!("rank 0 should have failed: {other:?}"),
    }

    assert_eq!(std::fs::read_to_string(&config.csv_path).unwrap(), "");
    let log = std::fs::read_to_string(&config.log_path).unwrap();
    assert!(log.contains("[Rank 0] Starting communication"));
    assert!(log.contains("[Rank 0] Finalizing process and releasing resources."));
    assert!(log.contains("[Rank 0] Failed with TransportError while communicating"));
}

#[test]
fn test_process_launcher_writes_one_row_per_rank() {
    let dir = tempfile::tempdir().unwrap();
    let status = run_binary(dir.path(), &[]);
    assert!(status.success(), "{status}");

    let csv_path = dir.path().join("tiempos.csv");
    let text = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(text.matches("rank,compute_time,comm_time,total_time").count(), 1);
    let rows = csv_rows(&csv_path);
    let ranks: BTreeSet<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(ranks, BTreeSet::from(["0", "1", "2"]));

    let log = std::fs::read_to_string(dir.path().join("log.txt")).unwrap();
    assert_eq!(log.matches("Using dynamic port:").count(), 1);
    assert_eq!(log.matches("Times -> Compute:").count(), 3);
}

#[test]
fn test_process_launcher_unavailable_device_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let status = run_binary(dir.path(), &["--device", "cuda"]);
    assert!(!status.success());
    assert!(csv_rows(&dir.path().join("tiempos.csv")).is_empty());
}
