use std::time::Duration;

/// Interval between control plane version queries.
pub(crate) const VERSION_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Deadline for the control plane version to become observable.
pub(crate) const VERSION_POLL_DEADLINE: Duration = Duration::from_secs(2 * 60);

/// Interval between ready-node count queries.
pub(crate) const READY_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Budget for all nodes to become ready again after a node upgrade.
pub(crate) const NODE_READY_AFTER_UPGRADE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Interval between API reachability probes after a node pool upgrade.
pub(crate) const TUNNEL_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Deadline for API connectivity to re-establish after a node pool upgrade.
pub(crate) const TUNNEL_POLL_DEADLINE: Duration = Duration::from_secs(60);

/// Page size limit for Kubernetes list API calls.
pub(crate) const KUBE_API_PAGE_SIZE: u32 = 500;

/// The etcd image handed to the upgrade script alongside an etcd override.
pub(crate) const ETCD_IMAGE: &str = "3.4.9-1";

/// Environment variable carrying the etcd version override for the upgrade script.
pub(crate) const ETCD_VERSION_ENV: &str = "TEST_ETCD_VERSION";

/// Environment variable carrying the etcd storage backend override.
pub(crate) const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

/// Environment variable carrying the etcd image override.
pub(crate) const ETCD_IMAGE_ENV: &str = "TEST_ETCD_IMAGE";

/// Environment variable which skips the upgrade script's confirmation prompt
/// about implicit etcd upgrades.
pub(crate) const ALLOW_IMPLICIT_ETCD_UPGRADE_ENV: &str = "TEST_ALLOW_IMPLICIT_ETCD_UPGRADE";

/// Environment variable carrying the node OS distribution override for the
/// upgrade script.
pub(crate) const NODE_OS_DISTRIBUTION_ENV: &str = "KUBE_NODE_OS_DISTRIBUTION";

/// The version prefix character applied inconsistently by observed components.
pub(crate) const VERSION_PREFIX: char = 'v';
