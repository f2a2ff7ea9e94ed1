use std::{
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{
    adjust_timeout,
    constants::NODE_DIR_PREFIX,
    nodes::{
        common::{
            binary::BinaryResolver,
            config::{injection::read_public_key, paths::NODE_KEY_FILE},
            node::{PreparedNode, SpawnNodeError, prepare_node_home},
        },
        create_tempdir,
        node::Node,
    },
    topology::{
        config::{ClusterConfig, TopologyBuildError, TopologyBuilder, TopologySpec},
        generation::GeneratedTopology,
    },
};

/// Runtime representation of a spawned topology with running nodes.
pub struct Topology {
    pub(crate) nodes: Vec<Node>,
}

pub type DeployedNodes = Vec<Node>;

#[derive(Debug, Error)]
pub enum SpawnTopologyError {
    #[error(transparent)]
    Build(#[from] TopologyBuildError),
    #[error("failed to create localnet staging dir")]
    Staging {
        #[source]
        source: io::Error,
    },
    #[error("failed to run '{binary} localnet'")]
    LocalnetLaunch {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("'{binary} localnet' exited with {status}: {stderr}")]
    LocalnetFailed {
        binary: PathBuf,
        status: ExitStatus,
        stderr: String,
    },
    #[error("failed to read boot node key {path}")]
    BootNodeKey {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Node(#[from] SpawnNodeError),
}

impl Topology {
    /// Validate `spec` against `config`, then generate, configure and start
    /// every node.
    pub async fn spawn(
        spec: TopologySpec,
        config: &ClusterConfig,
    ) -> Result<Self, SpawnTopologyError> {
        let generated = TopologyBuilder::new(spec, config).build()?;
        Self::spawn_generated(&generated).await
    }

    pub async fn spawn_generated(generated: &GeneratedTopology) -> Result<Self, SpawnTopologyError> {
        let binary = BinaryResolver::resolve_path(generated.base());
        let staging = create_tempdir().map_err(|source| SpawnTopologyError::Staging { source })?;

        run_localnet(&binary, staging.path(), generated).await?;

        let boot_node = boot_node_address(staging.path(), generated)?;
        let prepared = generated
            .nodes()
            .iter()
            .map(|descriptor| {
                let boot_node = boot_node
                    .as_deref()
                    .filter(|_| descriptor.index != 0);
                prepare_node_home(
                    staging.path(),
                    descriptor,
                    generated.genesis_overrides(),
                    boot_node,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let nodes = Self::spawn_nodes(prepared, &binary, generated).await?;

        info!(nodes = nodes.len(), "local topology is up");
        Ok(Self { nodes })
    }

    pub(crate) async fn spawn_nodes(
        prepared: Vec<PreparedNode>,
        binary: &Path,
        generated: &GeneratedTopology,
    ) -> Result<DeployedNodes, SpawnTopologyError> {
        let startup_timeout = adjust_timeout(generated.base().startup_timeout());
        let keep_home = generated.base().keep_logs;

        let mut nodes = Vec::with_capacity(prepared.len());
        for node in prepared {
            nodes.push(Node::spawn(node, binary, startup_timeout, keep_home).await?);
        }

        Ok(nodes)
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn into_nodes(self) -> DeployedNodes {
        self.nodes
    }
}

async fn run_localnet(
    binary: &Path,
    staging: &Path,
    generated: &GeneratedTopology,
) -> Result<(), SpawnTopologyError> {
    let spec = generated.spec();
    debug!(
        binary = %binary.display(),
        staging = %staging.display(),
        validators = spec.validators,
        non_validators = spec.non_validators,
        shards = generated.base().shards,
        "generating localnet homes"
    );

    let output = Command::new(binary)
        .arg("--home")
        .arg(staging)
        .arg("localnet")
        .arg("--validators")
        .arg(spec.validators.to_string())
        .arg("--non-validators")
        .arg(spec.non_validators.to_string())
        .arg("--shards")
        .arg(generated.base().shards.to_string())
        .arg("--prefix")
        .arg(NODE_DIR_PREFIX)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| SpawnTopologyError::LocalnetLaunch {
            binary: binary.to_path_buf(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }

    Err(SpawnTopologyError::LocalnetFailed {
        binary: binary.to_path_buf(),
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
    })
}

/// `<public key>@<addr>` of the first node, or `None` for single-node
/// clusters.
fn boot_node_address(
    staging: &Path,
    generated: &GeneratedTopology,
) -> Result<Option<String>, SpawnTopologyError> {
    let Some(boot) = generated.boot_node().filter(|_| generated.nodes().len() > 1) else {
        return Ok(None);
    };

    let path = staging.join(boot.name()).join(NODE_KEY_FILE);
    let public_key =
        read_public_key(&path).map_err(|source| SpawnTopologyError::BootNodeKey { path, source })?;

    Ok(Some(format!("{public_key}@{}", boot.network_addr())))
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use serde_json::json;

    use super::*;

    #[test]
    fn messages_name_the_offending_paths() {
        let missing = Path::new("/nonexistent/staging/node0/node_key.json");
        let err = SpawnTopologyError::BootNodeKey {
            path: missing.to_path_buf(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(
            err.to_string(),
            "failed to read boot node key /nonexistent/staging/node0/node_key.json"
        );
        assert!(err.source().is_some());

        let err = SpawnTopologyError::from(SpawnNodeError::Spawn {
            binary: PathBuf::from("/opt/near/neard"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        });
        assert_eq!(err.to_string(), "failed to spawn node process '/opt/near/neard'");
    }

    #[tokio::test]
    async fn missing_binary_fails_before_any_node_starts() {
        let config = ClusterConfig::default().with_client_override(0, json!({"archive": true}));
        let generated = TopologyBuilder::new(TopologySpec::single_archival(), &config)
            .build()
            .expect("valid topology");

        let err = run_localnet(
            Path::new("/nonexistent/neard"),
            Path::new("/nonexistent/staging"),
            &generated,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SpawnTopologyError::LocalnetLaunch { .. }));
        assert_eq!(err.to_string(), "failed to run '/nonexistent/neard localnet'");
    }
}
