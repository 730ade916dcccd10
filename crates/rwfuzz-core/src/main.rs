use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rwfuzz_core::{logging, Campaign, ClusterControl, RunConfig, RunContext};
use rwfuzz_explore::targets;
use rwfuzz_ledger::{ExecutionService, JsonRpcService, ManifestOracle, TypeOracle};
use tracing::{info, warn};

/// Differential read/write-set conflict fuzzer for smart contracts.
#[derive(Parser, Debug)]
#[command(name = "rwfuzz", version, about, long_about = None)]
struct Args {
    /// Type oracle manifest describing the contract's functions and
    /// candidate parameter values.
    #[arg(long)]
    manifest: PathBuf,
    /// JSON run configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Resume from a saved pair pool instead of generating seeds.
    #[arg(long)]
    load: Option<PathBuf>,
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    result_root: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    /// Search only: record confirmed conflicts without load-testing them.
    #[arg(long)]
    skip_experiments: bool,
}

impl Args {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(root) = &self.result_root {
            config.result_root = root.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.skip_experiments {
            config.skip_experiments = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    args.apply(&mut config);

    let info = ManifestOracle::from_path(&args.manifest)
        .and_then(|oracle| oracle.contract_info())
        .with_context(|| format!("type oracle failed on {}", args.manifest.display()))?;
    let service: Arc<dyn ExecutionService> =
        Arc::new(JsonRpcService::new(config.ledger_config(&info.name)));
    let cluster = ClusterControl::new(config.cluster.clone());

    let ctx = RunContext::create(config, info, service).context("cannot create run directory")?;
    let guards = logging::init(&ctx.run_dir)?;
    info!(target: targets::EXECUTION, run_dir = %ctx.run_dir.display(), "run started");

    let load = args.load.clone();
    let campaign = tokio::task::spawn_blocking(move || Campaign::new(ctx).run(load.as_deref()));

    tokio::select! {
        joined = campaign => {
            let outcome = joined.context("campaign task failed")?;
            cluster.stop_logged();
            let stats = outcome?;
            info!(target: targets::EXECUTION, rounds = stats.rounds, "run complete");
            drop(guards);
            Ok(())
        }
        _ = shutdown_signal() => {
            info!(target: targets::EXECUTION, "signal received, stopping cluster");
            cluster.stop_logged();
            drop(guards);
            std::process::exit(0);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to install CTRL+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
