use clap::{ArgGroup, Parser, Subcommand};
use cluster_upgrade::config::{
    EnvOverlay, EtcdOverride, Location, Provider, ProviderContext, UpgradeTarget,
};
use cluster_upgrade::Result;
use std::path::PathBuf;

/// These are the supported cli configuration options for cluster upgrade.
#[derive(Parser)]
#[command(name = "cluster-upgrade", version)]
#[command(about = "Drives a cluster to a target version and verifies the result", long_about = None)]
#[command(group(ArgGroup::new("location").required(true).args(["zone", "region"])))]
pub(crate) struct CliArgs {
    /// The provider whose mechanism performs the upgrade: 'script' or 'managed'.
    #[arg(long, default_value = "script")]
    provider: String,

    /// This is the provider project id.
    #[arg(long)]
    project: String,

    /// This is the name of the cluster being upgraded.
    #[arg(long)]
    cluster: String,

    /// The zone the cluster lives in (zonal clusters).
    #[arg(long)]
    zone: Option<String>,

    /// The region the cluster lives in (regional clusters).
    #[arg(long)]
    region: Option<String>,

    /// This is the Kubernetes Namespace the upgrade operates in.
    #[arg(short, long, default_value = "default")]
    namespace: String,

    /// The control plane API address, used for diagnostic network traces.
    #[arg(long, default_value = "")]
    api_address: String,

    /// Path of the external upgrade script (script provider only).
    #[arg(long, env = "CLUSTER_UPGRADE_SCRIPT", default_value = "cluster/upgrade.sh", value_name = "FILE_PATH")]
    upgrade_script: PathBuf,

    /// The management CLI binary (managed provider only).
    #[arg(long, default_value = "gcloud")]
    management_cli: String,

    /// The etcd version override, for downgrade-compatibility signalling.
    /// Only valid together with --etcd-storage-backend.
    #[arg(long, requires = "etcd_storage_backend")]
    etcd_version: Option<String>,

    /// The etcd storage backend override. Only valid together with --etcd-version.
    #[arg(long, requires = "etcd_version")]
    etcd_storage_backend: Option<String>,

    /// Extra environment variables for the control plane upgrade mechanism
    /// (can be repeated: --control-plane-env KEY=VALUE).
    #[arg(long = "control-plane-env", value_name = "KEY=VALUE")]
    control_plane_envs: Vec<String>,

    /// Extra environment variables for the node upgrade mechanism
    /// (can be repeated: --node-env KEY=VALUE).
    #[arg(long = "node-env", value_name = "KEY=VALUE")]
    node_envs: Vec<String>,

    /// Budget for all nodes to become ready again after a node upgrade.
    #[arg(long, default_value = "5m")]
    readiness_timeout: humantime::Duration,

    /// Emit one machine-readable JSON line per operation outcome instead of a
    /// log line.
    #[arg(long, default_value_t = false)]
    json_outcome: bool,

    #[command(subcommand)]
    operation: Operation,
}

/// The orchestration operation to run.
#[derive(Subcommand)]
pub(crate) enum Operation {
    /// Upgrade only the control plane to the target version and verify it.
    UpgradeControlPlane {
        /// The target version.
        version: String,
    },
    /// Upgrade the control plane, then the nodes, verifying each phase.
    Upgrade {
        /// The target version.
        version: String,

        /// The node image/OS distribution to switch to.
        #[arg(long)]
        node_image: Option<String>,
    },
    /// Downgrade the nodes, then the control plane, verifying each phase.
    Downgrade {
        /// The target version.
        version: String,

        /// The node image/OS distribution to switch to.
        #[arg(long)]
        node_image: Option<String>,
    },
}

impl CliArgs {
    /// This assembles the read-only provider context from the cli options.
    pub(crate) fn provider_context(&self) -> ProviderContext {
        let location = match (&self.zone, &self.region) {
            (Some(zone), _) => Location::Zone(zone.clone()),
            (None, Some(region)) => Location::Region(region.clone()),
            // clap's location group guarantees one of the two is set.
            (None, None) => Location::Zone(String::new()),
        };

        let etcd_override = match (&self.etcd_version, &self.etcd_storage_backend) {
            (Some(version), Some(backend)) => Some(EtcdOverride::new(version, backend)),
            _ => None,
        };

        ProviderContext::new(
            Provider::from(self.provider.as_str()),
            self.project.as_str(),
            self.cluster.as_str(),
            location,
        )
        .with_namespace(self.namespace.as_str())
        .with_api_address(self.api_address.as_str())
        .with_upgrade_script(self.upgrade_script.clone())
        .with_management_cli(self.management_cli.as_str())
        .with_etcd_override(etcd_override)
    }

    /// This returns the desired end state for the requested operation.
    pub(crate) fn upgrade_target(&self) -> UpgradeTarget {
        match &self.operation {
            Operation::UpgradeControlPlane { version } => UpgradeTarget::new(version, None),
            Operation::Upgrade {
                version,
                node_image,
            }
            | Operation::Downgrade {
                version,
                node_image,
            } => UpgradeTarget::new(version, node_image.clone()),
        }
    }

    /// This returns the requested operation.
    pub(crate) fn operation(&self) -> &Operation {
        &self.operation
    }

    /// This returns the extra environment overlay for control plane upgrades.
    pub(crate) fn control_plane_envs(&self) -> Result<EnvOverlay> {
        EnvOverlay::from_pairs(self.control_plane_envs.as_slice())
    }

    /// This returns the extra environment overlay for node upgrades.
    pub(crate) fn node_envs(&self) -> Result<EnvOverlay> {
        EnvOverlay::from_pairs(self.node_envs.as_slice())
    }

    /// This returns the post-upgrade node readiness budget.
    pub(crate) fn readiness_timeout(&self) -> std::time::Duration {
        self.readiness_timeout.into()
    }

    /// True if outcomes should be emitted as JSON lines.
    pub(crate) fn json_outcome(&self) -> bool {
        self.json_outcome
    }
}
