use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde_json::Value;

use crate::{
    constants::NODE_DIR_PREFIX,
    topology::{
        config::{GenesisOverride, TopologySpec},
        configs::base::BaseConfig,
    },
};

/// Node role within the generated topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRole {
    Validator,
    NonValidator,
}

impl NodeRole {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Validator => "validator",
            Self::NonValidator => "non-validator",
        }
    }
}

/// Fully generated configuration for an individual node.
#[derive(Clone, Debug)]
pub struct GeneratedNodeConfig {
    pub index: usize,
    pub role: NodeRole,
    pub archival: bool,
    pub rpc_port: u16,
    pub network_port: u16,
    /// Object merged into the node's `config.json`.
    pub client_overrides: Value,
}

impl GeneratedNodeConfig {
    #[must_use]
    /// Name of the node's home directory as created by `neard localnet`.
    pub fn name(&self) -> String {
        format!("{NODE_DIR_PREFIX}{}", self.index)
    }

    #[must_use]
    pub const fn rpc_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.rpc_port)
    }

    #[must_use]
    pub const fn network_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.network_port)
    }
}

/// Validated node descriptors for one cluster, in index order.
#[derive(Clone, Debug)]
pub struct GeneratedTopology {
    pub(crate) spec: TopologySpec,
    pub(crate) base: BaseConfig,
    pub(crate) genesis_overrides: Vec<GenesisOverride>,
    pub(crate) nodes: Vec<GeneratedNodeConfig>,
}

impl GeneratedTopology {
    #[must_use]
    pub const fn spec(&self) -> &TopologySpec {
        &self.spec
    }

    #[must_use]
    pub const fn base(&self) -> &BaseConfig {
        &self.base
    }

    #[must_use]
    pub fn genesis_overrides(&self) -> &[GenesisOverride] {
        &self.genesis_overrides
    }

    #[must_use]
    pub fn nodes(&self) -> &[GeneratedNodeConfig] {
        &self.nodes
    }

    /// The first validator; every other node boots from it.
    #[must_use]
    pub fn boot_node(&self) -> Option<&GeneratedNodeConfig> {
        self.nodes.first()
    }
}
