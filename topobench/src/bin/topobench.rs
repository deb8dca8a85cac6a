use clap::Parser;
use std::process::ExitCode;
use topobench::cli::{Cli, Command, WorkerArgs};
use topobench::record::ResultRecorder;
use topobench::{RendezvousEndpoint, execute_run, run_worker};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let ok = match cli.command {
        Some(Command::Worker(args)) => worker(args).await,
        None => coordinate(&cli).await,
    };
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

async fn coordinate(cli: &Cli) -> bool {
    let config = cli.run.to_config();
    match execute_run(&config).await {
        Ok(summary) if summary.is_success() => {
            info!(
                "results written to {} and {}",
                config.csv_path.display(),
                config.log_path.display()
            );
            true
        }
        Ok(summary) => {
            error!(
                "{} of {} workers failed: ranks {:?}",
                summary.failed_ranks().len(),
                summary.world_size,
                summary.failed_ranks()
            );
            false
        }
        Err(e) => {
            error!(kind = %e.kind(), "run did not start: {e}");
            false
        }
    }
}

/// A single rank spawned by a coordinator running with `--launcher processes`.
async fn worker(args: WorkerArgs) -> bool {
    let config = args.run.to_config();
    let Some(port) = config.rendezvous_port else {
        error!(rank = args.rank, "worker started without --port");
        return false;
    };
    let endpoint = RendezvousEndpoint::new(config.host.clone(), port);
    let recorder = ResultRecorder::new(&config.log_path, &config.csv_path);
    run_worker(args.rank, &endpoint, &config, &recorder)
        .await
        .is_success()
}
