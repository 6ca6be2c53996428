use crate::common::{
    constants::KUBE_API_PAGE_SIZE,
    error::{K8sClientGeneration, ListNodes, NodeInfoAbsent, Result, ServerVersion},
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::{
    api::{Api, ListParams},
    Client, ResourceExt,
};
use snafu::ResultExt;

/// The versions a node reports for its components.
#[derive(Clone, Debug)]
pub struct NodeVersions {
    pub name: String,
    pub kubelet_version: String,
    pub proxy_version: String,
}

/// The cluster state queries the orchestrator verifies against.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// The version reported by the apiserver.
    async fn server_version(&self) -> Result<String>;

    /// Component versions of every ready and schedulable node.
    async fn list_ready_nodes(&self) -> Result<Vec<NodeVersions>>;

    /// The number of nodes registered with the cluster, ready or not.
    async fn count_registered_nodes(&self) -> Result<usize>;

    /// The number of nodes currently reporting Ready.
    async fn count_ready_nodes(&self) -> Result<usize>;
}

/// Kubernetes-backed ClusterApi.
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Generate a new KubeCluster from the default kubeconfig/in-cluster config.
    pub async fn new() -> Result<Self> {
        let client = Client::try_default().await.context(K8sClientGeneration)?;
        Ok(KubeCluster { client })
    }

    fn nodes_api(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    /// List all Node resources, following list continue tokens.
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let mut nodes: Vec<Node> = Vec::with_capacity(KUBE_API_PAGE_SIZE as usize);
        let mut list_params = ListParams::default().limit(KUBE_API_PAGE_SIZE);

        loop {
            let node_list = self
                .nodes_api()
                .list(&list_params)
                .await
                .context(ListNodes)?;

            let maybe_token = node_list.metadata.continue_.clone();

            nodes.extend(node_list);

            match maybe_token {
                Some(ref token) => {
                    list_params = list_params.continue_token(token);
                }
                None => break,
            }
        }

        Ok(nodes)
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn server_version(&self) -> Result<String> {
        let info = self
            .client
            .apiserver_version()
            .await
            .context(ServerVersion)?;
        Ok(info.git_version)
    }

    async fn list_ready_nodes(&self) -> Result<Vec<NodeVersions>> {
        let nodes = self.list_nodes().await?;

        nodes
            .iter()
            .filter(|node| node_is_ready(node) && node_is_schedulable(node))
            .map(|node| {
                let info = node
                    .status
                    .as_ref()
                    .and_then(|status| status.node_info.as_ref())
                    .ok_or(NodeInfoAbsent {
                        node: node.name_any(),
                    }
                    .build())?;

                Ok(NodeVersions {
                    name: node.name_any(),
                    kubelet_version: info.kubelet_version.clone(),
                    proxy_version: info.kube_proxy_version.clone(),
                })
            })
            .collect()
    }

    async fn count_registered_nodes(&self) -> Result<usize> {
        Ok(self.list_nodes().await?.len())
    }

    async fn count_ready_nodes(&self) -> Result<usize> {
        let nodes = self.list_nodes().await?;
        Ok(nodes.iter().filter(|node| node_is_ready(node)).count())
    }
}

/// Returns true only if the Node's Ready status.condition value is "True".
pub(crate) fn node_is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|condition| condition.type_ == "Ready" && condition.status == "True")
        })
        .unwrap_or(false)
}

/// A node is schedulable unless its spec marks it unschedulable.
pub(crate) fn node_is_schedulable(node: &Node) -> bool {
    node.spec
        .as_ref()
        .map(|spec| spec.unschedulable != Some(true))
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::{node_is_ready, node_is_schedulable};
    use k8s_openapi::api::core::v1::{Node, NodeCondition, NodeSpec, NodeStatus};

    fn node_with_ready_condition(status: &str) -> Node {
        Node {
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: status.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn ready_condition_true_means_ready() {
        assert!(node_is_ready(&node_with_ready_condition("True")));
        assert!(!node_is_ready(&node_with_ready_condition("False")));
        assert!(!node_is_ready(&node_with_ready_condition("Unknown")));
    }

    #[test]
    fn nodes_without_conditions_are_not_ready() {
        assert!(!node_is_ready(&Node::default()));
    }

    #[test]
    fn unschedulable_spec_marks_a_node_unschedulable() {
        let mut node = Node::default();
        assert!(node_is_schedulable(&node));

        node.spec = Some(NodeSpec {
            unschedulable: Some(true),
            ..Default::default()
        });
        assert!(!node_is_schedulable(&node));
    }
}
