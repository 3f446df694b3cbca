//! podpart - network partition injector for Kubernetes services
//!
//! Deliberately drops traffic between pods of services in a cluster to
//! validate retry, timeout and failover behavior under partial network
//! failure. Applied rules are restored on duration expiry or interrupt;
//! any pod left unrestored forces a non-zero exit with a copyable manual
//! cleanup command.

mod config;
mod output;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use podpart_lib::{
    summarize, DryRunExecutor, KubeExecutor, KubeResolver, Orchestrator, PartitionSpec,
    TargetResolver,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Network partition injector for Kubernetes services
#[derive(Parser)]
#[command(name = "podpart")]
#[command(author, version, about = "Inject network partitions between Kubernetes services", long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging
    #[arg(long, short)]
    verbose: bool,

    /// Output format for the per-pod result records
    #[arg(long, short, default_value = "table")]
    format: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition network traffic between service pods
    Partition(PartitionArgs),
}

#[derive(Args)]
struct PartitionArgs {
    /// Service whose pods receive the fault rules
    #[arg(long)]
    source_service: String,

    /// Target service to cut off, resolved to its cluster address
    #[arg(long, conflicts_with = "target_host")]
    target_service: Option<String>,

    /// Target host to cut off, used verbatim
    #[arg(long)]
    target_host: Option<String>,

    /// Restrict the partition to a single TCP port
    #[arg(long)]
    target_port: Option<u16>,

    /// Kubernetes namespace (default from PODPART_NAMESPACE, else "default")
    #[arg(long, short)]
    namespace: Option<String>,

    /// Fault duration in seconds
    #[arg(long, default_value_t = 60)]
    duration: u64,

    /// Percentage of matching packets to drop (100 = hard partition)
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(1..=100))]
    drop_percent: u8,

    /// Drop traffic in both directions instead of egress only
    #[arg(long)]
    bidirectional: bool,

    /// Run the full state machine without touching the cluster
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer())
        .init();

    let cfg = config::CliConfig::load()?;

    match cli.command {
        Commands::Partition(args) => run_partition(args, cfg, cli.format).await,
    }
}

async fn run_partition(
    args: PartitionArgs,
    cfg: config::CliConfig,
    format: output::OutputFormat,
) -> Result<()> {
    let namespace = args.namespace.unwrap_or_else(|| cfg.namespace.clone());
    let spec = PartitionSpec::new(
        args.source_service,
        namespace.clone(),
        args.target_service,
        args.target_host,
        args.target_port,
        args.drop_percent,
        Duration::from_secs(args.duration),
        args.bidirectional,
        args.dry_run,
    )?;

    if spec.is_broad() {
        output::print_warning(&format!(
            "no target specified: this will drop ALL traffic from '{}' pods",
            spec.source_service
        ));
    }
    output::print_info(&format!(
        "partitioning '{}' -> '{}' in namespace '{}' for {}s (drop {}%{}{})",
        spec.source_service,
        spec.target_label(),
        namespace,
        spec.duration.as_secs(),
        spec.drop_percent,
        if spec.bidirectional {
            ", bidirectional"
        } else {
            ""
        },
        if spec.dry_run { ", dry run" } else { "" },
    ));

    let client = kube::Client::try_default()
        .await
        .context("failed to build Kubernetes client")?;
    let resolver = KubeResolver::new(client.clone());

    let pods = resolver
        .list_running_pods(&namespace, &spec.source_service)
        .await
        .context("failed to list pods for the source service")?;
    if pods.is_empty() {
        output::print_error(&format!(
            "no running pods found for service '{}' in namespace '{}'",
            spec.source_service, namespace
        ));
        bail!("nothing to partition, aborting before any network mutation");
    }
    output::print_info(&format!("resolved {} running pod(s)", pods.len()));

    let target_addr = match (&spec.target_host, &spec.target_service) {
        (Some(host), _) => Some(host.clone()),
        (None, Some(service)) => Some(resolver.resolve_address(&namespace, service).await),
        (None, None) => None,
    };
    if let Some(addr) = &target_addr {
        output::print_info(&format!("target resolves to {addr}"));
    }

    let (cancel_tx, cancel_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            output::print_warning("interrupt received, restoring partitions early");
            let _ = cancel_tx.send(());
        }
    });

    let orch_config = cfg.orchestrator_config();
    tracing::debug!(?orch_config, "orchestrator configuration");
    let results = if spec.dry_run {
        let executor = Arc::new(DryRunExecutor::new());
        let orchestrator = Orchestrator::new(executor.clone(), orch_config);
        let results = orchestrator
            .run(&spec, pods, target_addr.clone(), cancel_rx)
            .await;
        output::print_info(&format!(
            "dry run complete, {} remote command(s) skipped",
            executor.invocations()
        ));
        results
    } else {
        let executor = Arc::new(KubeExecutor::new(client, &namespace));
        Orchestrator::new(executor, orch_config)
            .run(&spec, pods, target_addr.clone(), cancel_rx)
            .await
    };

    output::print_results(&results, format);

    let (summary, exit_code) = summarize(&results, &spec);
    println!("{summary}");

    if exit_code == 0 {
        output::print_success("all applied partition rules were restored");
    } else {
        output::print_error("one or more pods still carry fault rules, see remediation above");
    }
    std::process::exit(exit_code);
}
