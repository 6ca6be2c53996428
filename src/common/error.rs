use snafu::Snafu;
use std::time::Duration;

/// For use with multiple fallible operations which may fail for different reasons, but are
/// defined withing the same scope and must return to the outer scope (calling scope) using
/// the try operator -- '?'.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))]
pub enum Error {
    /// Error for when an orchestration operation is requested for a provider
    /// without an upgrade mechanism.
    #[snafu(display("Cluster upgrade is not implemented for provider {}", provider))]
    UnsupportedProvider { provider: String },

    /// Error for when mandatory options for an UpgradeOrchestrator are missing when building.
    #[snafu(display("Mandatory options for UpgradeOrchestrator were not given"))]
    OrchestratorOptionsAbsent,

    /// Error for when Kubernetes API client generation fails.
    #[snafu(display("Failed to generate kubernetes client: {}", source))]
    K8sClientGeneration { source: kube_client::Error },

    /// Error for when the apiserver version query fails.
    #[snafu(display("Failed to get the apiserver version: {}", source))]
    ServerVersion { source: kube::Error },

    /// Error for when a Kubernetes API request for listing Nodes fails.
    #[snafu(display("Failed to list Nodes: {}", source))]
    ListNodes { source: kube::Error },

    /// Error for when a Node resource is missing its nodeInfo.
    #[snafu(display("Failed to get .status.nodeInfo from Node {}", node))]
    NodeInfoAbsent { node: String },

    /// Error for when spawning an upgrade command fails.
    #[snafu(display(
        "Failed to run upgrade command,\ncommand: {},\nargs: {:?},\ncommand_error: {}",
        command,
        args,
        source
    ))]
    UpgradeCommand {
        source: std::io::Error,
        command: String,
        args: Vec<String>,
    },

    /// Error for when an upgrade command execution completes, but with an error.
    #[snafu(display(
        "Upgrade command returned an error,\ncommand: {},\nargs: {:?},\nstd_err: {}",
        command,
        args,
        std_err
    ))]
    UpgradeCommandFailed {
        command: String,
        args: Vec<String>,
        std_err: String,
    },

    /// Error for when an extra environment variable input is not a KEY=VALUE pair.
    #[snafu(display("'{}' is not a KEY=VALUE environment variable pair", pair))]
    InvalidEnvPair { pair: String },

    /// Error for when a poll deadline elapses without a single completed attempt.
    #[snafu(display(
        "The {} deadline elapsed without a completed attempt",
        humantime::format_duration(*deadline)
    ))]
    PollDeadlineElapsed { deadline: Duration },

    /// Error for when the control plane version stays unobservable past the deadline.
    #[snafu(display(
        "Couldn't get the control plane version within {}: {}",
        humantime::format_duration(*deadline),
        source
    ))]
    ControlPlaneVersionTimeout {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
        deadline: Duration,
    },

    /// Error for when the observed control plane version does not match the wanted one.
    #[snafu(display(
        "Control plane had apiserver version {} which does not start with {}",
        got,
        want
    ))]
    ControlPlaneVersionMismatch { want: String, got: String },

    /// Error for when a node's kubelet version does not match the wanted one.
    #[snafu(display(
        "Node {} had kubelet version {} which does not start with {}",
        node,
        got,
        want
    ))]
    NodeKubeletVersionMismatch {
        node: String,
        want: String,
        got: String,
    },

    /// Error for when a node's kube-proxy version does not match the wanted one.
    #[snafu(display(
        "Node {} had kube-proxy version {} which does not start with {}",
        node,
        got,
        want
    ))]
    NodeProxyVersionMismatch {
        node: String,
        want: String,
        got: String,
    },

    /// Error for when the registered node count cannot be determined.
    #[snafu(display("Couldn't detect number of nodes: {}", source))]
    NodeCountUnknown {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    /// Error for when the expected number of nodes does not become ready in time.
    #[snafu(display(
        "{} nodes were not ready within {}: {}",
        want,
        humantime::format_duration(*timeout),
        source
    ))]
    NodesNotReady {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
        want: usize,
        timeout: Duration,
    },

    /// Error for when the control plane upgrade phase fails.
    #[snafu(display("Control plane upgrade failed: {}", source))]
    ControlPlaneUpgrade {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    /// Error for when control plane verification fails after an apparently
    /// successful control plane upgrade.
    #[snafu(display(
        "Control plane verification failed after an apparently successful upgrade: {}",
        source
    ))]
    ControlPlaneVerify {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    /// Error for when the node upgrade phase fails.
    #[snafu(display("Node upgrade failed: {}", source))]
    NodeUpgrade {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    /// Error for when node version verification fails after an apparently
    /// successful node upgrade.
    #[snafu(display(
        "Node verification failed after an apparently successful upgrade: {}",
        source
    ))]
    NodeVerify {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    /// Error for when the post-upgrade node readiness wait fails.
    #[snafu(display("Readiness wait after node upgrade failed: {}", source))]
    ReadinessWait {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },
}

/// A wrapper type to remove repeated Result<T, Error> returns.
pub type Result<T, E = Error> = std::result::Result<T, E>;
