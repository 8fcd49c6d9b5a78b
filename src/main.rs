use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fairshare_core::{
    config::Config,
    controller::FairnessController,
    models::{JobStats, TopologyNode},
    policy::PolicyServer,
};

#[derive(Parser)]
#[command(name = "fairshare-core")]
#[command(version = "0.1.0")]
#[command(about = "Fair-share scheduling core: policy server + fairness controller")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Comma-separated per-node core counts to seed `total_cores` at
    /// startup, e.g. "4,8,2". Standalone wiring only: in production
    /// this is driven by `update_topology` from the cluster topology
    /// source instead.
    #[arg(short = 't', long, value_delimiter = ',')]
    topology: Vec<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("fairshare_core={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting fair-share scheduling core v{}",
        env!("CARGO_PKG_VERSION")
    );

    std::env::set_var("CONFIG_FILE", &cli.config);
    let config = Config::load()?;
    info!(config_file = %cli.config, "configuration loaded");

    let shared_config = std::sync::Arc::new(tokio::sync::RwLock::new(config));

    let initial_cores: u64 = if cli.topology.is_empty() {
        0
    } else {
        cli.topology.iter().sum()
    };
    let policy = PolicyServer::spawn(initial_cores);
    info!(total_cores = initial_cores, "policy server initialized");

    if !cli.topology.is_empty() {
        let nodes = cli
            .topology
            .iter()
            .map(|&cores| TopologyNode { cores })
            .collect();
        policy.update_topology(nodes).await;
    }

    let controller = FairnessController::new(policy.clone(), shared_config);
    tokio::spawn(async move {
        controller.run().await;
    });
    info!("fairness controller started");

    // Nothing submits jobs or task-scheduler queries in this standalone
    // binary: job submission and the task scheduler's `next_job` calls
    // are the surrounding framework's responsibility. Run until
    // interrupted so the background actors keep serving a programmatic
    // embedder (e.g. over a future RPC front end, out of this crate's
    // scope).
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    Ok(())
}

/// A trivial in-memory `JobHandle`, useful for local demos and as a
/// seam embedders can copy when wiring a real job process.
#[allow(dead_code)]
struct StaticJobHandle {
    pending_tasks: u64,
    running_tasks: u64,
}

#[async_trait::async_trait]
impl fairshare_core::models::JobHandle for StaticJobHandle {
    async fn get_stats(&self) -> Result<JobStats> {
        Ok(JobStats {
            pending_tasks: self.pending_tasks,
            running_tasks: self.running_tasks,
        })
    }
}
