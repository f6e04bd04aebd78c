//! Network configuration
//!
//! Passed explicitly to [`crate::connect`]. The compact `key=value` form
//! accepted by [`NetworkConfig::from_str`] is what the CLI takes from
//! `--network` / `Z_WEB_NETWORK`:
//!
//! ```text
//! type=CLIENT storageDriver=ipfs nodeList=http://a:5001,http://b:5001 hidden=true
//! ```
//!
//! Only client nodes are supported; `type=SERVER` is rejected.

use crate::{Result, StorageError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Where blobs are kept
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    /// In-process map, lost on exit (tests and development)
    Memory,
    /// IPFS nodes reached over the HTTP RPC API
    #[default]
    Ipfs,
}

/// Configuration for the storage network connection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Backend driver
    pub storage_driver: StorageDriver,
    /// Node API endpoints, tried in order
    pub node_list: Vec<String>,
    /// Skip announcing new content to peers after a publish
    pub hidden: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            storage_driver: StorageDriver::Ipfs,
            node_list: vec!["http://localhost:5001".to_string()],
            hidden: false,
            timeout: Duration::from_secs(30),
        }
    }
}

impl NetworkConfig {
    /// Configuration for a throwaway in-memory backend
    pub fn memory() -> Self {
        Self {
            storage_driver: StorageDriver::Memory,
            node_list: Vec::new(),
            ..Default::default()
        }
    }

    /// Create with a single node endpoint
    pub fn with_node(endpoint: impl Into<String>) -> Self {
        Self {
            node_list: vec![endpoint.into()],
            ..Default::default()
        }
    }

    /// Set whether new content is announced to peers
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check that the configuration can be used to connect
    pub fn validate(&self) -> Result<()> {
        if self.storage_driver == StorageDriver::Ipfs && self.node_list.is_empty() {
            return Err(StorageError::Configuration(
                "ipfs driver requires at least one node in nodeList".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromStr for NetworkConfig {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        let mut config = Self::default();

        for pair in s.split_whitespace() {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                StorageError::Configuration(format!("expected key=value, got '{}'", pair))
            })?;

            match key {
                "type" => {
                    if !value.eq_ignore_ascii_case("client") {
                        return Err(StorageError::Configuration(format!(
                            "unsupported node type '{}', only CLIENT is available",
                            value
                        )));
                    }
                }
                "storageDriver" => {
                    config.storage_driver = match value.to_ascii_lowercase().as_str() {
                        "memory" => StorageDriver::Memory,
                        "ipfs" => StorageDriver::Ipfs,
                        other => {
                            return Err(StorageError::Configuration(format!(
                                "unknown storage driver '{}'",
                                other
                            )))
                        }
                    }
                }
                "nodeList" => {
                    config.node_list = value
                        .split(',')
                        .filter(|node| !node.is_empty())
                        .map(|node| node.trim_end_matches('/').to_string())
                        .collect();
                }
                "hidden" => {
                    config.hidden = value.parse().map_err(|_| {
                        StorageError::Configuration(format!("hidden must be true or false, got '{}'", value))
                    })?;
                }
                "timeout" => {
                    let secs: u64 = value.parse().map_err(|_| {
                        StorageError::Configuration(format!("timeout must be seconds, got '{}'", value))
                    })?;
                    config.timeout = Duration::from_secs(secs);
                }
                other => {
                    return Err(StorageError::Configuration(format!(
                        "unknown network setting '{}'",
                        other
                    )))
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}
