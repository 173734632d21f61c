//! Configuration module for Galena
//!
//! Parses the `[node]` section from TOML with sensible defaults. The only
//! setting the replica core owns is the local node address that seeds the
//! process-wide identity; everything else (listeners, storage paths,
//! topology) belongs to the layers above.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::error::{GalenaError, Result};
use crate::node::NodeId;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local node settings.
    pub node: NodeConfig,
}

/// Settings for the local node identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address whose raw bytes identify this replica in counter contexts.
    pub address: IpAddr,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
        }
    }
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| GalenaError::Decode(format!("invalid config: {e}")))
    }

    /// The node id this configuration designates.
    pub fn node_id(&self) -> NodeId {
        NodeId::from(self.node.address)
    }
}
