//! # z-web Storage
//!
//! Boundary to the content-addressable network that holds encrypted site
//! files.
//!
//! This crate provides:
//! - **StorageAdapter trait**: put, get, remove and membership refresh
//! - **IPFS backend**: any number of IPFS nodes over the HTTP RPC API
//! - **Memory backend**: an in-process store for tests and development
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Site Synchronizer            │
//! ├─────────────────────────────────────────┤
//! │          StorageAdapter Trait           │
//! ├────────────────────┬────────────────────┤
//! │    IpfsStorage     │   MemoryStorage    │
//! ├────────────────────┴────────────────────┤
//! │          IPFS nodes (node list)         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use zweb_storage::{connect, NetworkConfig};
//!
//! let storage = connect(&NetworkConfig::with_node("http://localhost:5001")).await?;
//! let storage_ref = storage.put("/site/index.html", &blob).await?;
//! let blob = storage.get(&storage_ref).await?;
//! ```

pub mod config;
pub mod error;
pub mod ipfs;
pub mod memory;

pub use config::{NetworkConfig, StorageDriver};
pub use error::{Result, StorageError};
pub use ipfs::IpfsStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Opaque reference to a stored blob
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageRef(String);

impl StorageRef {
    /// Wrap a backend identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The backend identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StorageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for storage network backends
///
/// Blobs are text (hex). Implementations impose no retry policy beyond
/// failing over between configured nodes.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Store a blob under a logical name and return its reference
    async fn put(&self, name: &str, blob: &str) -> Result<StorageRef>;

    /// Retrieve a blob by reference
    async fn get(&self, storage_ref: &StorageRef) -> Result<String>;

    /// Release a blob
    async fn remove(&self, storage_ref: &StorageRef) -> Result<()>;

    /// Propagate new placement information through the network
    async fn refresh_membership(&self) -> Result<()>;

    /// Whether blobs outlive this process
    fn is_persistent(&self) -> bool;
}

/// Build the adapter selected by the configuration
pub async fn connect(config: &NetworkConfig) -> Result<Arc<dyn StorageAdapter>> {
    config.validate()?;

    match config.storage_driver {
        StorageDriver::Memory => {
            info!("Using in-memory storage (blobs will not persist)");
            Ok(Arc::new(MemoryStorage::new()))
        }
        StorageDriver::Ipfs => {
            let store = IpfsStorage::new(config.clone())?;
            info!(nodes = config.node_list.len(), "Using IPFS storage");
            Ok(Arc::new(store))
        }
    }
}
