use crate::{
    cluster::ClusterApi,
    common::{
        constants::{TUNNEL_POLL_DEADLINE, TUNNEL_POLL_INTERVAL},
        error::Result,
        poll::poll_immediate,
    },
    config::{EnvOverlay, ProviderContext},
    exec::CommandRunner,
    provider::ProviderUpgradeDriver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Upgrade driver which goes through the provider's management CLI. Nodes are
/// upgraded one node pool at a time, in the order the provider lists them.
pub struct ManagedUpgrade {
    context: ProviderContext,
    runner: Arc<dyn CommandRunner>,
    cluster: Arc<dyn ClusterApi>,
}

impl ManagedUpgrade {
    pub fn new(
        context: ProviderContext,
        runner: Arc<dyn CommandRunner>,
        cluster: Arc<dyn ClusterApi>,
    ) -> Self {
        ManagedUpgrade {
            context,
            runner,
            cluster,
        }
    }

    /// Discovers the current set of node pools. An empty listing means zero
    /// pools, not an error.
    async fn node_pools(&self) -> Result<Vec<String>> {
        let args = vec![
            "container".to_string(),
            "node-pools".to_string(),
            format!("--project={}", self.context.project()),
            self.context.location().flag(),
            "list".to_string(),
            format!("--cluster={}", self.context.cluster()),
            "--format=get(name)".to_string(),
        ];

        let output = self
            .runner
            .run(self.context.management_cli(), &args, &EnvOverlay::new())
            .await?;

        if output.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(output
            .stdout
            .split_whitespace()
            .map(String::from)
            .collect())
    }

    /// Best-effort wait for API connectivity to re-establish after a node
    /// pool upgrade. A timeout here is grooming, not verification, and is
    /// only logged.
    async fn wait_for_connectivity(&self) {
        let reachable = poll_immediate(TUNNEL_POLL_INTERVAL, TUNNEL_POLL_DEADLINE, || async move {
            self.cluster.server_version().await.map(Some)
        })
        .await;

        if let Err(timeout) = reachable {
            let error = timeout.into_last_error();
            warn!(%error, "API connectivity did not re-establish after node pool upgrade");
        }
    }
}

#[async_trait]
impl ProviderUpgradeDriver for ManagedUpgrade {
    async fn upgrade_control_plane(&self, version: &str, extra_envs: &EnvOverlay) -> Result<()> {
        let args = vec![
            "container".to_string(),
            "clusters".to_string(),
            format!("--project={}", self.context.project()),
            self.context.location().flag(),
            "upgrade".to_string(),
            self.context.cluster().to_string(),
            "--master".to_string(),
            format!("--cluster-version={version}"),
            "--quiet".to_string(),
        ];

        info!(%version, "Upgrading control plane through the management CLI");
        self.runner
            .run(self.context.management_cli(), &args, extra_envs)
            .await?;
        Ok(())
    }

    async fn upgrade_nodes(
        &self,
        version: &str,
        image: Option<&str>,
        extra_envs: &EnvOverlay,
    ) -> Result<()> {
        info!(%version, image = image.unwrap_or_default(), "Upgrading nodes through the management CLI");

        let pools = self.node_pools().await?;
        info!(node.pools = ?pools, "Found node pools");

        for pool in pools {
            let mut args = vec![
                "container".to_string(),
                "clusters".to_string(),
                format!("--project={}", self.context.project()),
                self.context.location().flag(),
                "upgrade".to_string(),
                self.context.cluster().to_string(),
                format!("--node-pool={pool}"),
                format!("--cluster-version={version}"),
                "--quiet".to_string(),
            ];
            if let Some(image) = image {
                args.push(format!("--image-type={image}"));
            }

            self.runner
                .run(self.context.management_cli(), &args, extra_envs)
                .await?;

            self.wait_for_connectivity().await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ManagedUpgrade;
    use crate::{
        cluster::{ClusterApi, NodeVersions},
        common::error::{Result, UpgradeCommandFailed},
        config::{EnvOverlay, Location, Provider, ProviderContext},
        exec::{CommandOutput, CommandRunner},
        provider::ProviderUpgradeDriver,
    };
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct ReachableCluster;

    #[async_trait]
    impl ClusterApi for ReachableCluster {
        async fn server_version(&self) -> Result<String> {
            Ok("v1.2.3".to_string())
        }
        async fn list_ready_nodes(&self) -> Result<Vec<NodeVersions>> {
            Ok(Vec::new())
        }
        async fn count_registered_nodes(&self) -> Result<usize> {
            Ok(0)
        }
        async fn count_ready_nodes(&self) -> Result<usize> {
            Ok(0)
        }
    }

    /// Replies with the scripted stdout per call, in order; calls beyond the
    /// script succeed with empty output.
    struct ScriptedRunner {
        calls: Mutex<Vec<Vec<String>>>,
        replies: Mutex<Vec<Result<String>>>,
    }

    impl ScriptedRunner {
        fn new(replies: Vec<Result<String>>) -> Self {
            ScriptedRunner {
                calls: Mutex::new(Vec::new()),
                replies: Mutex::new(replies),
            }
        }

        fn recorded_args(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            _program: &str,
            args: &[String],
            _env: &EnvOverlay,
        ) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(args.to_vec());
            let reply = {
                let mut replies = self.replies.lock().unwrap();
                if replies.is_empty() {
                    Ok(String::new())
                } else {
                    replies.remove(0)
                }
            };
            reply.map(|stdout| CommandOutput {
                stdout,
                stderr: String::new(),
            })
        }
    }

    fn driver_with_replies(
        replies: Vec<Result<String>>,
    ) -> (ManagedUpgrade, Arc<ScriptedRunner>) {
        let context = ProviderContext::new(
            Provider::Managed,
            "proj",
            "cluster-1",
            Location::Zone("z1".into()),
        );
        let runner = Arc::new(ScriptedRunner::new(replies));
        (
            ManagedUpgrade::new(context, runner.clone(), Arc::new(ReachableCluster)),
            runner,
        )
    }

    fn command_error() -> crate::common::error::Error {
        UpgradeCommandFailed {
            command: "gcloud".to_string(),
            args: Vec::<String>::new(),
            std_err: "quota".to_string(),
        }
        .build()
    }

    #[tokio::test(start_paused = true)]
    async fn zero_discovered_pools_mean_zero_upgrade_calls() {
        let (driver, runner) = driver_with_replies(vec![Ok("  \n".to_string())]);

        driver
            .upgrade_nodes("1.2.3", None, &EnvOverlay::new())
            .await
            .unwrap();

        // Only the discovery listing ran.
        assert_eq!(runner.recorded_args().len(), 1);
        assert!(runner.recorded_args()[0].contains(&"node-pools".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn every_discovered_pool_is_upgraded_in_listed_order() {
        let (driver, runner) = driver_with_replies(vec![Ok("pool-a pool-b\n".to_string())]);

        driver
            .upgrade_nodes("1.2.3", Some("gci"), &EnvOverlay::new())
            .await
            .unwrap();

        let calls = runner.recorded_args();
        assert_eq!(calls.len(), 3);
        assert!(calls[1].contains(&"--node-pool=pool-a".to_string()));
        assert!(calls[2].contains(&"--node-pool=pool-b".to_string()));
        for call in &calls[1 ..] {
            assert!(call.contains(&"--cluster-version=1.2.3".to_string()));
            assert!(call.contains(&"--image-type=gci".to_string()));
            assert!(call.contains(&"--quiet".to_string()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn image_type_is_omitted_without_an_image_override() {
        let (driver, runner) = driver_with_replies(vec![Ok("pool-a\n".to_string())]);

        driver
            .upgrade_nodes("1.2.3", None, &EnvOverlay::new())
            .await
            .unwrap();

        let calls = runner.recorded_args();
        assert!(!calls[1].iter().any(|arg| arg.starts_with("--image-type=")));
    }

    #[tokio::test(start_paused = true)]
    async fn first_pool_failure_aborts_the_remaining_pools() {
        let (driver, runner) = driver_with_replies(vec![
            Ok("pool-a pool-b\n".to_string()),
            Err(command_error()),
        ]);

        let error = driver
            .upgrade_nodes("1.2.3", None, &EnvOverlay::new())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            crate::common::error::Error::UpgradeCommandFailed { .. }
        ));
        // Discovery plus the one failed pool upgrade; pool-b never attempted.
        assert_eq!(runner.recorded_args().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn control_plane_upgrade_targets_the_master() {
        let (driver, runner) = driver_with_replies(Vec::new());

        driver
            .upgrade_control_plane("1.2.3", &EnvOverlay::new())
            .await
            .unwrap();

        let calls = runner.recorded_args();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(&"--master".to_string()));
        assert!(calls[0].contains(&"--cluster-version=1.2.3".to_string()));
        assert!(calls[0].contains(&"--zone=z1".to_string()));
    }
}
