use async_trait::async_trait;

use crate::{
    nodes::types::SplitStorageInfo,
    scenario::{DynError, Observation, TerminationMode, TerminationOutcome},
    topology::config::{ClusterConfig, TopologySpec},
};

/// Read-only view of a node's chain head.
#[async_trait]
pub trait HeightSource: Send + Sync {
    async fn current_height_and_hash(&self) -> Result<Observation, DynError>;
}

/// Deployer-agnostic control surface for one running node.
#[async_trait]
pub trait NodeControl: HeightSource {
    fn name(&self) -> String;

    async fn split_storage_info(&self) -> Result<SplitStorageInfo, DynError> {
        Err("split_storage_info not supported by this node".into())
    }

    /// Stop the node. Must return [`TerminationOutcome::AlreadyStopped`]
    /// rather than an error when the node is no longer running.
    async fn terminate(&mut self, mode: TerminationMode) -> Result<TerminationOutcome, DynError>;
}

/// Starts a cluster and hands back one node per topology slot, in index
/// order.
#[async_trait]
pub trait ClusterBootstrapper: Send + Sync {
    type Node: NodeControl;

    async fn start_cluster(
        &self,
        topology: &TopologySpec,
        config: &ClusterConfig,
    ) -> Result<Vec<Self::Node>, DynError>;
}
