//! Command-line surface shared by the binary and the process launcher.

use crate::config::{BenchConfig, Launcher};
use crate::device::DeviceKind;
use crate::group::RendezvousEndpoint;
use crate::types::{Rank, Topology};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "topobench",
    version,
    about = "Compare compute time against ring, star and all-to-all communication time"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,

    /// Debug-level diagnostics (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single rank; spawned by the coordinator in process mode
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    #[arg(long)]
    pub rank: Rank,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Run options. Unset options keep the value from the environment or the
/// built-in default.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Number of workers [default: 4]
    #[arg(long, visible_alias = "gpus")]
    pub world_size: Option<u32>,

    /// Side length of the multiplied square matrices [default: 2048]
    #[arg(long)]
    pub matrix_size: Option<usize>,

    /// ring, star or all_to_all [default: ring]
    #[arg(long)]
    pub topology: Option<Topology>,

    /// Rendezvous port; picked at random from 12350-12400 when unset
    #[arg(long)]
    pub port: Option<u16>,

    /// Rendezvous host [default: 127.0.0.1]
    #[arg(long)]
    pub host: Option<String>,

    /// Event log file [default: log.txt]
    #[arg(long)]
    pub log_path: Option<PathBuf>,

    /// Timing results file [default: tiempos.csv]
    #[arg(long)]
    pub csv_path: Option<PathBuf>,

    /// cpu or cuda [default: cpu]
    #[arg(long)]
    pub device: Option<DeviceKind>,

    /// tasks or processes [default: tasks]
    #[arg(long)]
    pub launcher: Option<Launcher>,

    /// Seconds to wait for every worker to join [default: 60]
    #[arg(long)]
    pub formation_timeout_secs: Option<u64>,

    /// Seed for the compute matrices; each rank adds its rank
    #[arg(long)]
    pub seed: Option<u64>,
}

impl RunArgs {
    /// Overlay the options that were given onto `config`.
    pub fn apply(&self, config: &mut BenchConfig) {
        if let Some(n) = self.world_size {
            config.world_size = n;
        }
        if let Some(n) = self.matrix_size {
            config.matrix_size = n;
        }
        if let Some(t) = self.topology {
            config.topology = t;
        }
        if let Some(p) = self.port {
            config.rendezvous_port = Some(p);
        }
        if let Some(h) = &self.host {
            config.host = h.clone();
        }
        if let Some(p) = &self.log_path {
            config.log_path = p.clone();
        }
        if let Some(p) = &self.csv_path {
            config.csv_path = p.clone();
        }
        if let Some(d) = self.device {
            config.device = d;
        }
        if let Some(l) = self.launcher {
            config.launcher = l;
        }
        if let Some(s) = self.formation_timeout_secs {
            config.formation_timeout = Duration::from_secs(s);
        }
        if let Some(s) = self.seed {
            config.seed = Some(s);
        }
    }

    /// Environment, then these options.
    pub fn to_config(&self) -> BenchConfig {
        let mut config = BenchConfig::from_env();
        self.apply(&mut config);
        config
    }
}

/// Arguments that make the binary run `rank` of the run described by
/// `config` against `endpoint`.
pub fn worker_args(config: &BenchConfig, endpoint: &RendezvousEndpoint, rank: Rank) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "worker".into(),
        "--rank".into(),
        rank.to_string().into(),
        "--world-size".into(),
        config.world_size.to_string().into(),
        "--matrix-size".into(),
        config.matrix_size.to_string().into(),
        "--topology".into(),
        config.topology.to_string().into(),
        "--host".into(),
        endpoint.host.clone().into(),
        "--port".into(),
        endpoint.port.to_string().into(),
        "--log-path".into(),
        config.log_path.clone().into_os_string(),
        "--csv-path".into(),
        config.csv_path.clone().into_os_string(),
        "--device".into(),
        config.device.to_string().into(),
        "--formation-timeout-secs".into(),
        config.formation_timeout.as_secs().max(1).to_string().into(),
    ];
    if let Some(seed) = config.seed {
        args.push("--seed".into());
        args.push(seed.to_string().into());
    }
    args
}
