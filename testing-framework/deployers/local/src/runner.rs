use async_trait::async_trait;
use cluster_harness_core::{
    nodes::node::Node,
    scenario::{ClusterBootstrapper, DynError},
    topology::{
        config::{ClusterConfig, TopologySpec},
        deployment::{SpawnTopologyError, Topology},
    },
};
use thiserror::Error;
use tracing::{debug, info};

/// Spawns `neard` validators and non-validators as local processes.
#[derive(Clone)]
pub struct LocalDeployer {}

/// Errors surfaced by the local deployer while starting a cluster.
#[derive(Debug, Error)]
pub enum LocalDeployerError {
    #[error("failed to spawn local topology")]
    Spawn {
        #[source]
        source: SpawnTopologyError,
    },
}

#[async_trait]
impl ClusterBootstrapper for LocalDeployer {
    type Node = Node;

    async fn start_cluster(
        &self,
        topology: &TopologySpec,
        config: &ClusterConfig,
    ) -> Result<Vec<Self::Node>, DynError> {
        let topology = self.deploy(*topology, config).await?;
        Ok(topology.into_nodes())
    }
}

impl LocalDeployer {
    #[must_use]
    /// Construct a local deployer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start every node of `spec` and wait until each answers `status`.
    pub async fn deploy(
        &self,
        spec: TopologySpec,
        config: &ClusterConfig,
    ) -> Result<Topology, LocalDeployerError> {
        info!(
            validators = spec.validators,
            non_validators = spec.non_validators,
            archival = spec.archival,
            overrides = config.client_overrides.len(),
            "starting local deployment"
        );

        let topology = Topology::spawn(spec, config).await.map_err(|source| {
            debug!(error = ?source, "local deployment failed");
            LocalDeployerError::Spawn { source }
        })?;

        info!(nodes = topology.nodes().len(), "local nodes are ready");
        Ok(topology)
    }
}

impl Default for LocalDeployer {
    fn default() -> Self {
        Self {}
    }
}
