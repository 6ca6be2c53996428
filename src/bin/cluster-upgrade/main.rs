use clap::Parser;
use cluster_upgrade::{
    cluster::{ClusterApi, KubeCluster},
    exec::{CommandRunner, ShellRunner},
    provider::driver_for,
    report::{JsonReporter, LogReporter, OutcomeReporter},
    Result, UpgradeOrchestrator,
};
use opts::{CliArgs, Operation};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod opts;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let opts = CliArgs::parse();
    run(&opts).await.map_err(|error| {
        error!(%error, "Failed to run cluster upgrade operation");
        error
    })
}

/// Initialize logging components -- tracing.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn run(opts: &CliArgs) -> Result<()> {
    let context = opts.provider_context();
    let control_plane_envs = opts.control_plane_envs()?;
    let node_envs = opts.node_envs()?;

    let cluster: Arc<dyn ClusterApi> = Arc::new(KubeCluster::new().await?);
    let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner);
    let driver = driver_for(&context, runner.clone(), cluster.clone());
    let reporter: Box<dyn OutcomeReporter> = if opts.json_outcome() {
        Box::new(JsonReporter)
    } else {
        Box::new(LogReporter)
    };

    let orchestrator = UpgradeOrchestrator::builder()
        .with_driver(driver)
        .with_cluster(cluster)
        .with_runner(runner)
        .with_reporter(reporter)
        .with_api_address(context.api_address())
        .with_readiness_timeout(opts.readiness_timeout())
        .build()?;

    let target = opts.upgrade_target();
    match opts.operation() {
        Operation::UpgradeControlPlane { .. } => {
            orchestrator
                .upgrade_control_plane_only(&target, &control_plane_envs)
                .await
        }
        Operation::Upgrade { .. } => {
            orchestrator
                .upgrade_cluster(&target, &control_plane_envs, &node_envs)
                .await
        }
        Operation::Downgrade { .. } => {
            orchestrator
                .downgrade_cluster(&target, &control_plane_envs, &node_envs)
                .await
        }
    }
}
