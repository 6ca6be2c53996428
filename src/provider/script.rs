use crate::{
    common::{
        constants::{
            ALLOW_IMPLICIT_ETCD_UPGRADE_ENV, ETCD_IMAGE, ETCD_IMAGE_ENV, ETCD_VERSION_ENV,
            NODE_OS_DISTRIBUTION_ENV, STORAGE_BACKEND_ENV,
        },
        error::Result,
        version::prefixed,
    },
    config::{EnvOverlay, ProviderContext},
    exec::CommandRunner,
    provider::ProviderUpgradeDriver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Upgrade driver which invokes an external upgrade script, selecting the
/// control plane with '-M' and the nodes with '-N'.
pub struct ScriptUpgrade {
    context: ProviderContext,
    runner: Arc<dyn CommandRunner>,
}

impl ScriptUpgrade {
    pub fn new(context: ProviderContext, runner: Arc<dyn CommandRunner>) -> Self {
        ScriptUpgrade { context, runner }
    }

    fn script(&self) -> String {
        self.context.upgrade_script().to_string_lossy().into_owned()
    }

    /// Layers the etcd downgrade-compatibility signalling onto the caller's
    /// extra envs. Without an override pair, the script's confirmation prompt
    /// about implicit etcd upgrades is answered with a blanket yes.
    fn etcd_env(&self, extra_envs: &EnvOverlay) -> EnvOverlay {
        match self.context.etcd_override() {
            Some(etcd) => extra_envs
                .clone()
                .with(ETCD_VERSION_ENV, etcd.version())
                .with(STORAGE_BACKEND_ENV, etcd.storage_backend())
                .with(ETCD_IMAGE_ENV, ETCD_IMAGE),
            None => extra_envs
                .clone()
                .with(ALLOW_IMPLICIT_ETCD_UPGRADE_ENV, "true"),
        }
    }
}

#[async_trait]
impl ProviderUpgradeDriver for ScriptUpgrade {
    async fn upgrade_control_plane(&self, version: &str, extra_envs: &EnvOverlay) -> Result<()> {
        let env = self.etcd_env(extra_envs);
        let args = vec!["-M".to_string(), prefixed(version)];

        info!(%version, "Upgrading control plane with the upgrade script");
        self.runner.run(self.script().as_str(), &args, &env).await?;
        Ok(())
    }

    async fn upgrade_nodes(
        &self,
        version: &str,
        image: Option<&str>,
        extra_envs: &EnvOverlay,
    ) -> Result<()> {
        let mut env = extra_envs.clone();
        let args = match image {
            Some(image) => {
                env = env.with(NODE_OS_DISTRIBUTION_ENV, image);
                vec!["-N".to_string(), "-o".to_string(), prefixed(version)]
            }
            None => vec!["-N".to_string(), prefixed(version)],
        };

        info!(%version, image = image.unwrap_or_default(), "Upgrading nodes with the upgrade script");
        self.runner.run(self.script().as_str(), &args, &env).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ScriptUpgrade;
    use crate::{
        common::error::Result,
        config::{EnvOverlay, EtcdOverride, Location, Provider, ProviderContext},
        exec::{CommandOutput, CommandRunner},
        provider::ProviderUpgradeDriver,
    };
    use async_trait::async_trait;
    use std::{
        path::PathBuf,
        sync::{Arc, Mutex},
    };

    #[derive(Clone)]
    struct RecordedCall {
        program: String,
        args: Vec<String>,
        env: EnvOverlay,
    }

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<RecordedCall>>,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(
            &self,
            program: &str,
            args: &[String],
            env: &EnvOverlay,
        ) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(RecordedCall {
                program: program.to_string(),
                args: args.to_vec(),
                env: env.clone(),
            });
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn context() -> ProviderContext {
        ProviderContext::new(Provider::Script, "proj", "cluster-1", Location::Zone("z1".into()))
            .with_upgrade_script(PathBuf::from("cluster/upgrade.sh"))
    }

    fn driver_with_runner(context: ProviderContext) -> (ScriptUpgrade, Arc<RecordingRunner>) {
        let runner = Arc::new(RecordingRunner::default());
        (ScriptUpgrade::new(context, runner.clone()), runner)
    }

    #[tokio::test]
    async fn control_plane_upgrade_defaults_to_allowing_implicit_etcd_upgrade() {
        let (driver, runner) = driver_with_runner(context());

        driver
            .upgrade_control_plane("1.2.3", &EnvOverlay::new().with("EXTRA", "1"))
            .await
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "cluster/upgrade.sh");
        assert_eq!(calls[0].args, vec!["-M", "v1.2.3"]);
        assert_eq!(calls[0].env.get("EXTRA"), Some("1"));
        assert_eq!(calls[0].env.get("TEST_ALLOW_IMPLICIT_ETCD_UPGRADE"), Some("true"));
        assert_eq!(calls[0].env.get("TEST_ETCD_VERSION"), None);
    }

    #[tokio::test]
    async fn etcd_override_pair_replaces_the_implicit_upgrade_default() {
        let (driver, runner) = driver_with_runner(
            context().with_etcd_override(Some(EtcdOverride::new("3.4.9", "etcd3"))),
        );

        driver
            .upgrade_control_plane("1.2.3", &EnvOverlay::new())
            .await
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].env.get("TEST_ETCD_VERSION"), Some("3.4.9"));
        assert_eq!(calls[0].env.get("STORAGE_BACKEND"), Some("etcd3"));
        assert_eq!(calls[0].env.get("TEST_ETCD_IMAGE"), Some("3.4.9-1"));
        assert_eq!(calls[0].env.get("TEST_ALLOW_IMPLICIT_ETCD_UPGRADE"), None);
    }

    #[tokio::test]
    async fn node_upgrade_without_image_keeps_the_plain_node_flag() {
        let (driver, runner) = driver_with_runner(context());

        driver
            .upgrade_nodes("1.2.3", None, &EnvOverlay::new())
            .await
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].args, vec!["-N", "v1.2.3"]);
        assert_eq!(calls[0].env.get("KUBE_NODE_OS_DISTRIBUTION"), None);
    }

    #[tokio::test]
    async fn node_upgrade_with_image_sets_the_distribution_override() {
        let (driver, runner) = driver_with_runner(context());

        driver
            .upgrade_nodes("1.2.3", Some("gci"), &EnvOverlay::new())
            .await
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].args, vec!["-N", "-o", "v1.2.3"]);
        assert_eq!(calls[0].env.get("KUBE_NODE_OS_DISTRIBUTION"), Some("gci"));
    }
}
