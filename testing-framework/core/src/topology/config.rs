use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::topology::{
    configs::base::BaseConfig,
    generation::{GeneratedNodeConfig, GeneratedTopology, NodeRole},
    utils::{TopologyResolveError, resolve_ports},
};

#[derive(Debug, Error)]
pub enum TopologyBuildError {
    #[error("topology must include at least one validator")]
    NoValidators,
    #[error("topology requests {archival} archival nodes but only has {nodes} nodes")]
    TooManyArchival { archival: usize, nodes: usize },
    #[error("client config override targets node {index}, topology has {nodes} nodes")]
    OverrideIndexOutOfRange { index: usize, nodes: usize },
    #[error("client config override for node {index} must be a JSON object")]
    OverrideNotObject { index: usize },
    #[error("genesis override must name at least one key")]
    EmptyGenesisPath,
    #[error(transparent)]
    Resolve(#[from] TopologyResolveError),
}

/// Node counts requested from a bootstrapper.
///
/// Nodes are indexed validators first, then non-validators. The last
/// `archival` indices run as archival nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopologySpec {
    pub validators: usize,
    pub non_validators: usize,
    pub archival: usize,
}

impl TopologySpec {
    #[must_use]
    pub const fn new(validators: usize, non_validators: usize, archival: usize) -> Self {
        Self {
            validators,
            non_validators,
            archival,
        }
    }

    /// One block-producing validator that is also archival.
    #[must_use]
    pub const fn single_archival() -> Self {
        Self::new(1, 0, 1)
    }

    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.validators + self.non_validators
    }

    #[must_use]
    pub const fn role_of(&self, index: usize) -> NodeRole {
        if index < self.validators {
            NodeRole::Validator
        } else {
            NodeRole::NonValidator
        }
    }

    #[must_use]
    pub const fn is_archival(&self, index: usize) -> bool {
        index < self.node_count() && index + self.archival >= self.node_count()
    }
}

/// Write `value` at `path` inside every node's `genesis.json`.
#[derive(Clone, Debug, PartialEq)]
pub struct GenesisOverride {
    pub path: Vec<String>,
    pub value: Value,
}

impl GenesisOverride {
    pub fn new<I, S>(path: I, value: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            value,
        }
    }
}

/// Base config plus the genesis and per-node client config overrides of one
/// cluster. Built once per scenario and not mutated after bootstrap.
#[derive(Clone, Debug, Default)]
pub struct ClusterConfig {
    pub base: BaseConfig,
    pub genesis_overrides: Vec<GenesisOverride>,
    pub client_overrides: BTreeMap<usize, Value>,
}

impl ClusterConfig {
    #[must_use]
    pub fn new(base: BaseConfig) -> Self {
        Self {
            base,
            genesis_overrides: Vec::new(),
            client_overrides: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_genesis_override(mut self, genesis_override: GenesisOverride) -> Self {
        self.genesis_overrides.push(genesis_override);
        self
    }

    /// Set a `config.json` override for the node at `index`. Repeated calls
    /// for the same index replace earlier values.
    #[must_use]
    pub fn with_client_override(mut self, index: usize, overrides: Value) -> Self {
        self.client_overrides.insert(index, overrides);
        self
    }
}

/// Validates a topology/config pair and produces per-node descriptors.
pub struct TopologyBuilder<'a> {
    spec: TopologySpec,
    config: &'a ClusterConfig,
}

impl<'a> TopologyBuilder<'a> {
    #[must_use]
    pub const fn new(spec: TopologySpec, config: &'a ClusterConfig) -> Self {
        Self { spec, config }
    }

    /// Check the invariants, allocate ports and merge overrides.
    pub fn build(self) -> Result<GeneratedTopology, TopologyBuildError> {
        let Self { spec, config } = self;
        validate(&spec, config)?;

        let count = spec.node_count();
        let mut ports = resolve_ports(count * 2, "node rpc/network")?;
        let network_ports = ports.split_off(count);
        let rpc_ports = ports;

        let nodes = (0..count)
            .map(|index| {
                let archival = spec.is_archival(index);
                GeneratedNodeConfig {
                    index,
                    role: spec.role_of(index),
                    archival,
                    rpc_port: rpc_ports[index],
                    network_port: network_ports[index],
                    client_overrides: node_overrides(
                        archival,
                        config.client_overrides.get(&index),
                    ),
                }
            })
            .collect();

        Ok(GeneratedTopology {
            spec,
            base: config.base.clone(),
            genesis_overrides: config.genesis_overrides.clone(),
            nodes,
        })
    }
}

fn validate(spec: &TopologySpec, config: &ClusterConfig) -> Result<(), TopologyBuildError> {
    if spec.validators == 0 {
        return Err(TopologyBuildError::NoValidators);
    }

    let nodes = spec.node_count();
    if spec.archival > nodes {
        return Err(TopologyBuildError::TooManyArchival {
            archival: spec.archival,
            nodes,
        });
    }

    for (&index, overrides) in &config.client_overrides {
        if index >= nodes {
            return Err(TopologyBuildError::OverrideIndexOutOfRange { index, nodes });
        }
        if !overrides.is_object() {
            return Err(TopologyBuildError::OverrideNotObject { index });
        }
    }

    if config
        .genesis_overrides
        .iter()
        .any(|genesis_override| genesis_override.path.is_empty())
    {
        return Err(TopologyBuildError::EmptyGenesisPath);
    }

    Ok(())
}

fn node_overrides(archival: bool, user: Option<&Value>) -> Value {
    let mut merged = Map::new();
    if archival {
        merged.insert("archive".to_owned(), Value::Bool(true));
    }
    if let Some(Value::Object(user)) = user {
        for (key, value) in user {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}
