//! Node configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use headex_p2p::{ExchangeConfig, PeerId, ProtocolId};

use crate::error::Result;

/// Configuration for a [`Node`](crate::Node).
///
/// ```json
/// {
///   "network": "private",
///   "trusted_peers": ["<64 hex chars>"],
///   "exchange": { "request_timeout": 10000 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Network name. Nodes only talk to nodes on the same network.
    pub network: String,

    /// Peers queried for headers.
    pub trusted_peers: Vec<PeerId>,

    pub exchange: ExchangeConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: "private".into(),
            trusted_peers: Vec::new(),
            exchange: ExchangeConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Protocol id derived from the network name.
    pub fn protocol(&self) -> ProtocolId {
        ProtocolId::header_exchange(&self.network)
    }
}
