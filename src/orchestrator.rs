use crate::{
    cluster::ClusterApi,
    common::{
        constants::NODE_READY_AFTER_UPGRADE_TIMEOUT,
        error::{
            ControlPlaneUpgrade, ControlPlaneVerify, NodeUpgrade, NodeVerify,
            OrchestratorOptionsAbsent, ReadinessWait, Result,
        },
    },
    config::{EnvOverlay, UpgradeTarget},
    exec::CommandRunner,
    provider::ProviderUpgradeDriver,
    report::{LogReporter, OutcomeReporter},
    verify::{ReadinessWaiter, VersionChecker},
};
use snafu::ResultExt;
use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};
use tracing::info;

/// This is a builder for the UpgradeOrchestrator.
#[derive(Default)]
pub struct UpgradeOrchestratorBuilder {
    driver: Option<Box<dyn ProviderUpgradeDriver>>,
    cluster: Option<Arc<dyn ClusterApi>>,
    runner: Option<Arc<dyn CommandRunner>>,
    reporter: Option<Box<dyn OutcomeReporter>>,
    api_address: String,
    readiness_timeout: Option<Duration>,
}

impl UpgradeOrchestratorBuilder {
    /// This is a builder option to set the provider upgrade driver. Mandatory.
    #[must_use]
    pub fn with_driver(mut self, driver: Box<dyn ProviderUpgradeDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// This is a builder option to set the cluster API client. Mandatory.
    #[must_use]
    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterApi>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// This is a builder option to set the command runner used for diagnostic
    /// traces. Mandatory.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// This is a builder option to set the outcome reporter. Defaults to the
    /// log reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Box<dyn OutcomeReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// This is a builder option to set the control plane address used for
    /// diagnostic traces.
    #[must_use]
    pub fn with_api_address<A>(mut self, api_address: A) -> Self
    where
        A: ToString,
    {
        self.api_address = api_address.to_string();
        self
    }

    /// This is a builder option to override the post-upgrade node readiness
    /// budget.
    #[must_use]
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = Some(timeout);
        self
    }

    /// Build the UpgradeOrchestrator.
    pub fn build(self) -> Result<UpgradeOrchestrator> {
        let driver = self.driver.ok_or(OrchestratorOptionsAbsent.build())?;
        let cluster = self.cluster.ok_or(OrchestratorOptionsAbsent.build())?;
        let runner = self.runner.ok_or(OrchestratorOptionsAbsent.build())?;

        Ok(UpgradeOrchestrator {
            driver,
            checker: VersionChecker::new(cluster.clone(), runner, self.api_address),
            waiter: ReadinessWaiter::new(cluster),
            reporter: self.reporter.unwrap_or(Box::new(LogReporter)),
            readiness_timeout: self
                .readiness_timeout
                .unwrap_or(NODE_READY_AFTER_UPGRADE_TIMEOUT),
        })
    }
}

/// Composes the provider upgrade driver and the verification components into
/// the three ordered operations. Each operation is fail-fast: the first phase
/// failure aborts the remaining phases, with no rollback; the cluster is left
/// as the failed phase left it.
pub struct UpgradeOrchestrator {
    driver: Box<dyn ProviderUpgradeDriver>,
    checker: VersionChecker,
    waiter: ReadinessWaiter,
    reporter: Box<dyn OutcomeReporter>,
    readiness_timeout: Duration,
}

impl std::fmt::Debug for UpgradeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeOrchestrator").finish_non_exhaustive()
    }
}

impl UpgradeOrchestrator {
    /// This creates an empty builder.
    pub fn builder() -> UpgradeOrchestratorBuilder {
        UpgradeOrchestratorBuilder::default()
    }

    /// Upgrades the control plane to the target version and verifies it.
    /// Worker nodes are left alone.
    pub async fn upgrade_control_plane_only(
        &self,
        target: &UpgradeTarget,
        control_plane_envs: &EnvOverlay,
    ) -> Result<()> {
        self.finalize("upgrade-control-plane", async {
            self.control_plane_phases(target, control_plane_envs).await
        })
        .await
    }

    /// Upgrades the whole cluster: control plane first, then nodes, each
    /// verified before the next phase starts.
    pub async fn upgrade_cluster(
        &self,
        target: &UpgradeTarget,
        control_plane_envs: &EnvOverlay,
        node_envs: &EnvOverlay,
    ) -> Result<()> {
        self.finalize("upgrade-cluster", async {
            self.control_plane_phases(target, control_plane_envs).await?;
            self.node_phases(target, node_envs).await
        })
        .await
    }

    /// Downgrades the whole cluster. Yes, this really is a downgrade, and the
    /// nodes must move to the older version before the control plane does: a
    /// newer control plane may reject or evict nodes running the older
    /// version, so running this in upgrade order risks cluster instability.
    pub async fn downgrade_cluster(
        &self,
        target: &UpgradeTarget,
        control_plane_envs: &EnvOverlay,
        node_envs: &EnvOverlay,
    ) -> Result<()> {
        self.finalize("downgrade-cluster", async {
            self.node_phases(target, node_envs).await?;
            self.control_plane_phases(target, control_plane_envs).await
        })
        .await
    }

    /// Control plane upgrade, then control plane verification.
    async fn control_plane_phases(
        &self,
        target: &UpgradeTarget,
        extra_envs: &EnvOverlay,
    ) -> Result<()> {
        self.driver
            .upgrade_control_plane(target.version(), extra_envs)
            .await
            .context(ControlPlaneUpgrade)?;

        self.checker
            .check_control_plane_version(target.version())
            .await
            .context(ControlPlaneVerify)
    }

    /// Node upgrade, readiness wait, then node version verification.
    async fn node_phases(&self, target: &UpgradeTarget, extra_envs: &EnvOverlay) -> Result<()> {
        self.driver
            .upgrade_nodes(target.version(), target.node_image(), extra_envs)
            .await
            .context(NodeUpgrade)?;

        self.waiter
            .wait_nodes_ready(self.readiness_timeout)
            .await
            .context(ReadinessWait)?;

        self.checker
            .check_nodes_versions(target.version())
            .await
            .context(NodeVerify)
    }

    /// Runs the phases of one operation and reports its start time, duration
    /// and outcome exactly once, on every exit path.
    async fn finalize<F>(&self, operation: &str, phases: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        info!(%operation, "Starting operation");
        let started = SystemTime::now();
        let clock = Instant::now();

        let outcome = phases.await;

        self.reporter
            .report(operation, started, clock.elapsed(), &outcome);
        outcome
    }
}
