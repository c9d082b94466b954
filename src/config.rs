use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use control_tower_core::DataPaths;

use crate::live::NotifierConfig;

pub const DEFAULT_PORT: u16 = 4567;

/// Where the data lives. Shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct DataArgs {
    /// Directory holding tasks.json and specs/
    #[arg(long, env = "TASK_MANAGER_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Task file, overriding <data-dir>/tasks.json
    #[arg(long, env = "TASK_MANAGER_DATA_FILE", global = true)]
    pub tasks_file: Option<PathBuf>,

    /// Spec directory, overriding <data-dir>/specs
    #[arg(long, env = "TASK_MANAGER_SPECS_DIR", global = true)]
    pub specs_dir: Option<PathBuf>,
}

impl DataArgs {
    pub fn paths(&self) -> DataPaths {
        DataPaths::resolve(
            self.data_dir.clone(),
            self.tasks_file.clone(),
            self.specs_dir.clone(),
        )
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Port for the HTTP API and live socket
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Built dashboard to serve for non-API paths
    #[arg(long, env = "TASK_MANAGER_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Skip classifying unclassified tasks at startup
    #[arg(long)]
    pub no_backfill: bool,

    /// Milliseconds the task file must stay unchanged before a push
    #[arg(long, default_value_t = 200)]
    pub quiet_ms: u64,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            static_dir: None,
            no_backfill: false,
            quiet_ms: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub paths: DataPaths,
    pub static_dir: Option<PathBuf>,
    pub backfill_topics: bool,
    pub notifier: NotifierConfig,
}

impl ServerConfig {
    pub fn new(serve: &ServeArgs, data: &DataArgs) -> Self {
        Self {
            addr: SocketAddr::new(serve.host, serve.port),
            paths: data.paths(),
            static_dir: serve.static_dir.clone(),
            backfill_topics: !serve.no_backfill,
            notifier: NotifierConfig {
                quiet_period: Duration::from_millis(serve.quiet_ms),
                ..NotifierConfig::default()
            },
        }
    }
}
