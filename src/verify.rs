use crate::{
    cluster::ClusterApi,
    common::{
        constants::{READY_POLL_INTERVAL, VERSION_POLL_DEADLINE, VERSION_POLL_INTERVAL},
        error::{
            ControlPlaneVersionMismatch, ControlPlaneVersionTimeout, NodeCountUnknown,
            NodeKubeletVersionMismatch, NodeProxyVersionMismatch, NodesNotReady, Result,
        },
        poll::poll_immediate,
        version::normalized,
    },
    config::EnvOverlay,
    exec::CommandRunner,
};
use snafu::{ensure, IntoError, ResultExt};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// Compares the observed versions of the control plane and the node set
/// against an expected version string, with a normalized-prefix match.
pub struct VersionChecker {
    cluster: Arc<dyn ClusterApi>,
    runner: Arc<dyn CommandRunner>,
    api_address: String,
}

impl VersionChecker {
    pub fn new<A>(cluster: Arc<dyn ClusterApi>, runner: Arc<dyn CommandRunner>, api_address: A) -> Self
    where
        A: ToString,
    {
        VersionChecker {
            cluster,
            runner,
            api_address: api_address.to_string(),
        }
    }

    /// Polls the apiserver version until it is observable, then requires it to
    /// prefix-match `want`. Transient query failures are retried up to a fixed
    /// deadline; a version mismatch is a hard error and is not retried.
    pub async fn check_control_plane_version(&self, want: &str) -> Result<()> {
        info!("Checking control plane version");

        let observed = poll_immediate(VERSION_POLL_INTERVAL, VERSION_POLL_DEADLINE, || async move {
            match self.cluster.server_version().await {
                Ok(version) => Ok(Some(version)),
                Err(error) => {
                    self.trace_route_to_control_plane().await;
                    Err(error)
                }
            }
        })
        .await;

        let observed = match observed {
            Ok(version) => version,
            Err(timeout) => {
                let deadline = timeout.deadline;
                return Err(
                    ControlPlaneVersionTimeout { deadline }.into_error(timeout.into_last_error())
                );
            }
        };

        let got = normalized(observed.as_str());
        ensure!(
            got.starts_with(want),
            ControlPlaneVersionMismatch {
                want: want.to_string(),
                got: got.to_string()
            }
        );

        info!(version = %want, "Control plane is at the wanted version");
        Ok(())
    }

    /// Requires every ready and schedulable node to prefix-match `want` on
    /// both its kubelet version and its kube-proxy version. A single query,
    /// not polled; the first mismatch fails the whole check.
    pub async fn check_nodes_versions(&self, want: &str) -> Result<()> {
        let nodes = self.cluster.list_ready_nodes().await?;

        for node in nodes {
            let kubelet = normalized(node.kubelet_version.as_str());
            ensure!(
                kubelet.starts_with(want),
                NodeKubeletVersionMismatch {
                    node: node.name.clone(),
                    want: want.to_string(),
                    got: kubelet.to_string()
                }
            );

            let proxy = normalized(node.proxy_version.as_str());
            ensure!(
                proxy.starts_with(want),
                NodeProxyVersionMismatch {
                    node: node.name.clone(),
                    want: want.to_string(),
                    got: proxy.to_string()
                }
            );
        }

        Ok(())
    }

    /// Best-effort diagnostic network trace toward the control plane address
    /// after a failed version query. Its own failures are only logged.
    async fn trace_route_to_control_plane(&self) {
        if self.api_address.is_empty() {
            debug!("No control plane address configured, skipping traceroute");
            return;
        }

        let args = vec!["-I".to_string(), self.api_address.clone()];
        match self.runner.run("traceroute", &args, &EnvOverlay::new()).await {
            Ok(output) if !output.stdout.is_empty() => info!("{}", output.stdout),
            Ok(_) => {}
            Err(error) => warn!(%error, "Error while running traceroute"),
        }
    }
}

/// Waits for the registered node count to come back ready after an upgrade.
pub struct ReadinessWaiter {
    cluster: Arc<dyn ClusterApi>,
}

impl ReadinessWaiter {
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        ReadinessWaiter { cluster }
    }

    /// Snapshots the total registered node count once, then polls readiness
    /// until that many nodes are ready or `timeout` elapses.
    pub async fn wait_nodes_ready(&self, timeout: Duration) -> Result<()> {
        let want = self
            .cluster
            .count_registered_nodes()
            .await
            .context(NodeCountUnknown)?;

        info!(
            nodes = want,
            timeout = %humantime::format_duration(timeout),
            "Waiting for all nodes to be ready after the upgrade"
        );
        self.wait_for_ready_count(want, timeout).await
    }

    /// Polls until `want` nodes are ready or `timeout` elapses.
    pub async fn wait_for_ready_count(&self, want: usize, timeout: Duration) -> Result<()> {
        poll_immediate(READY_POLL_INTERVAL, timeout, || async move {
            let ready = self.cluster.count_ready_nodes().await?;
            Ok((ready >= want).then_some(()))
        })
        .await
        .map_err(|poll_timeout| {
            let timeout = poll_timeout.deadline;
            NodesNotReady { want, timeout }.into_error(poll_timeout.into_last_error())
        })
    }
}
