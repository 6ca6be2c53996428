use crate::{
    cluster::ClusterApi,
    common::error::{Result, UnsupportedProvider},
    config::{EnvOverlay, Provider, ProviderContext},
    exec::CommandRunner,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Contains the script-driven upgrade mechanism.
pub mod script;

/// Contains the management-CLI upgrade mechanism.
pub mod managed;

use managed::ManagedUpgrade;
use script::ScriptUpgrade;

/// Performs the actual version swap for one provider. Both operations are
/// blocking; on success the cluster is expected (but not guaranteed, hence
/// verification) to reflect the new version, on error its state is undefined.
#[async_trait]
pub trait ProviderUpgradeDriver: Send + Sync {
    /// Upgrades the control plane to `version`.
    async fn upgrade_control_plane(&self, version: &str, extra_envs: &EnvOverlay) -> Result<()>;

    /// Upgrades all worker nodes to `version`, optionally switching their
    /// image/OS distribution.
    async fn upgrade_nodes(
        &self,
        version: &str,
        image: Option<&str>,
        extra_envs: &EnvOverlay,
    ) -> Result<()>;
}

/// Selects the upgrade driver for the configured provider. The provider set
/// is closed: unsupported identifiers get a driver whose operations fail
/// immediately without any collaborator calls.
pub fn driver_for(
    context: &ProviderContext,
    runner: Arc<dyn CommandRunner>,
    cluster: Arc<dyn ClusterApi>,
) -> Box<dyn ProviderUpgradeDriver> {
    match context.provider() {
        Provider::Script => Box::new(ScriptUpgrade::new(context.clone(), runner)),
        Provider::Managed => Box::new(ManagedUpgrade::new(context.clone(), runner, cluster)),
        Provider::Unsupported(id) => Box::new(UnsupportedUpgrade {
            provider: id.clone(),
        }),
    }
}

/// Driver for providers without an upgrade mechanism.
pub(crate) struct UnsupportedUpgrade {
    provider: String,
}

#[async_trait]
impl ProviderUpgradeDriver for UnsupportedUpgrade {
    async fn upgrade_control_plane(&self, _version: &str, _extra_envs: &EnvOverlay) -> Result<()> {
        UnsupportedProvider {
            provider: self.provider.clone(),
        }
        .fail()
    }

    async fn upgrade_nodes(
        &self,
        _version: &str,
        _image: Option<&str>,
        _extra_envs: &EnvOverlay,
    ) -> Result<()> {
        UnsupportedProvider {
            provider: self.provider.clone(),
        }
        .fail()
    }
}

#[cfg(test)]
mod tests {
    use super::{ProviderUpgradeDriver, UnsupportedUpgrade};
    use crate::{common::error::Error, config::EnvOverlay};

    #[tokio::test]
    async fn unsupported_driver_fails_both_operations_immediately() {
        let driver = UnsupportedUpgrade {
            provider: "bare-metal".to_string(),
        };

        let error = driver
            .upgrade_control_plane("1.2.3", &EnvOverlay::new())
            .await
            .unwrap_err();
        assert!(
            matches!(error, Error::UnsupportedProvider { ref provider } if provider == "bare-metal")
        );

        let error = driver
            .upgrade_nodes("1.2.3", None, &EnvOverlay::new())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::UnsupportedProvider { .. }));
    }
}
