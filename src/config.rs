use crate::common::error::{InvalidEnvPair, Result};
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// The provider whose mechanism performs the actual version swap. The set is
/// closed: anything other than the two supported mechanisms is carried as
/// Unsupported and fails on first use instead of falling through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    /// Script-driven upgrades through an external upgrade script.
    Script,
    /// Upgrades through the provider's management CLI, one node pool at a time.
    Managed,
    /// Any other provider identifier.
    Unsupported(String),
}

impl From<&str> for Provider {
    fn from(id: &str) -> Self {
        match id {
            "script" => Provider::Script,
            "managed" => Provider::Managed,
            other => Provider::Unsupported(other.to_string()),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Script => write!(f, "script"),
            Provider::Managed => write!(f, "managed"),
            Provider::Unsupported(id) => write!(f, "{id}"),
        }
    }
}

/// Cluster location parameter for the management CLI.
#[derive(Clone, Debug)]
pub enum Location {
    Zone(String),
    Region(String),
}

impl Location {
    /// Renders the location as a management CLI flag.
    pub fn flag(&self) -> String {
        match self {
            Location::Zone(zone) => format!("--zone={zone}"),
            Location::Region(region) => format!("--region={region}"),
        }
    }
}

/// The etcd version/storage-backend override pair handed to the upgrade
/// script for downgrade-compatibility signalling. Only ever set as a pair.
#[derive(Clone, Debug)]
pub struct EtcdOverride {
    version: String,
    storage_backend: String,
}

impl EtcdOverride {
    pub fn new<V, S>(version: V, storage_backend: S) -> Self
    where
        V: ToString,
        S: ToString,
    {
        EtcdOverride {
            version: version.to_string(),
            storage_backend: storage_backend.to_string(),
        }
    }

    pub fn version(&self) -> &str {
        self.version.as_str()
    }

    pub fn storage_backend(&self) -> &str {
        self.storage_backend.as_str()
    }
}

/// Everything needed to talk to a specific provider. Owned by the caller and
/// treated as read-only input by the orchestrator.
#[derive(Clone, Debug)]
pub struct ProviderContext {
    provider: Provider,
    project: String,
    cluster: String,
    location: Location,
    namespace: String,
    api_address: String,
    upgrade_script: PathBuf,
    management_cli: String,
    etcd_override: Option<EtcdOverride>,
}

impl ProviderContext {
    pub fn new<P, C>(provider: Provider, project: P, cluster: C, location: Location) -> Self
    where
        P: ToString,
        C: ToString,
    {
        ProviderContext {
            provider,
            project: project.to_string(),
            cluster: cluster.to_string(),
            location,
            namespace: "default".to_string(),
            api_address: String::new(),
            upgrade_script: PathBuf::from("cluster/upgrade.sh"),
            management_cli: "gcloud".to_string(),
            etcd_override: None,
        }
    }

    /// Sets the Kubernetes namespace the upgrade operates in.
    #[must_use]
    pub fn with_namespace<N>(mut self, namespace: N) -> Self
    where
        N: ToString,
    {
        self.namespace = namespace.to_string();
        self
    }

    /// Sets the control plane API address used for diagnostic traces.
    #[must_use]
    pub fn with_api_address<A>(mut self, api_address: A) -> Self
    where
        A: ToString,
    {
        self.api_address = api_address.to_string();
        self
    }

    /// Sets the path of the external upgrade script (script provider only).
    #[must_use]
    pub fn with_upgrade_script(mut self, script: PathBuf) -> Self {
        self.upgrade_script = script;
        self
    }

    /// Sets the management CLI binary (managed provider only).
    #[must_use]
    pub fn with_management_cli<M>(mut self, cli: M) -> Self
    where
        M: ToString,
    {
        self.management_cli = cli.to_string();
        self
    }

    /// Sets the etcd version/storage-backend override pair.
    #[must_use]
    pub fn with_etcd_override(mut self, etcd_override: Option<EtcdOverride>) -> Self {
        self.etcd_override = etcd_override;
        self
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn project(&self) -> &str {
        self.project.as_str()
    }

    pub fn cluster(&self) -> &str {
        self.cluster.as_str()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_str()
    }

    pub fn api_address(&self) -> &str {
        self.api_address.as_str()
    }

    pub fn upgrade_script(&self) -> &Path {
        self.upgrade_script.as_path()
    }

    pub fn management_cli(&self) -> &str {
        self.management_cli.as_str()
    }

    pub fn etcd_override(&self) -> Option<&EtcdOverride> {
        self.etcd_override.as_ref()
    }
}

/// The desired end state of an orchestration operation.
#[derive(Clone, Debug)]
pub struct UpgradeTarget {
    version: String,
    node_image: Option<String>,
}

impl UpgradeTarget {
    pub fn new<V>(version: V, node_image: Option<String>) -> Self
    where
        V: ToString,
    {
        UpgradeTarget {
            version: version.to_string(),
            node_image: node_image.filter(|image| !image.is_empty()),
        }
    }

    pub fn version(&self) -> &str {
        self.version.as_str()
    }

    /// The node image override, if any. None means no image change.
    pub fn node_image(&self) -> Option<&str> {
        self.node_image.as_deref()
    }
}

/// An explicit, immutable set of environment variables layered over the
/// inherited environment of an upgrade command. The process-wide environment
/// is never mutated.
#[derive(Clone, Debug, Default)]
pub struct EnvOverlay(Vec<(String, String)>);

impl EnvOverlay {
    pub fn new() -> Self {
        EnvOverlay::default()
    }

    /// Adds a variable to the overlay.
    #[must_use]
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: ToString,
        V: ToString,
    {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    /// Parses `KEY=VALUE` pairs, e.g. from CLI inputs.
    pub fn from_pairs(pairs: &[String]) -> Result<Self> {
        let mut overlay = EnvOverlay::new();
        for pair in pairs {
            let (key, value) = pair
                .split_once('=')
                .ok_or(InvalidEnvPair { pair: pair.clone() }.build())?;
            overlay = overlay.with(key, value);
        }
        Ok(overlay)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Looks up a variable in the overlay.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{EnvOverlay, Location, Provider, UpgradeTarget};
    use crate::common::error::Error;

    #[test]
    fn provider_identifiers_parse_into_a_closed_set() {
        assert_eq!(Provider::from("script"), Provider::Script);
        assert_eq!(Provider::from("managed"), Provider::Managed);
        assert_eq!(
            Provider::from("bare-metal"),
            Provider::Unsupported("bare-metal".to_string())
        );
    }

    #[test]
    fn location_renders_as_a_cli_flag() {
        assert_eq!(Location::Zone("us-central1-a".into()).flag(), "--zone=us-central1-a");
        assert_eq!(Location::Region("us-central1".into()).flag(), "--region=us-central1");
    }

    #[test]
    fn empty_node_image_means_no_image_change() {
        let target = UpgradeTarget::new("1.2.3", Some(String::new()));
        assert_eq!(target.node_image(), None);
    }

    #[test]
    fn env_overlay_parses_key_value_pairs() {
        let overlay =
            EnvOverlay::from_pairs(&["A=1".to_string(), "B=two=parts".to_string()]).unwrap();
        assert_eq!(overlay.get("A"), Some("1"));
        assert_eq!(overlay.get("B"), Some("two=parts"));

        let error = EnvOverlay::from_pairs(&["NOT_A_PAIR".to_string()]).unwrap_err();
        assert!(matches!(error, Error::InvalidEnvPair { .. }));
    }
}
