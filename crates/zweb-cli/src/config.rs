//! CLI configuration

use std::path::PathBuf;
use zweb_core::{sync::DEFAULT_CONCURRENCY, KeyStore};
use zweb_storage::NetworkConfig;

/// Default port for `get` and `browse`
pub const DEFAULT_PORT: u16 = 3001;

/// Settings shared by every action
#[derive(Clone, Debug)]
pub struct CliConfig {
    /// Key store file
    pub key_store: PathBuf,
    /// Storage network settings
    pub network: NetworkConfig,
    /// Port the site server listens on
    pub port: u16,
    /// Maximum parallel transfers
    pub concurrency: usize,
    /// Parent directory of scratch directories
    pub scratch_root: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            key_store: KeyStore::default_path(),
            network: NetworkConfig::default(),
            port: DEFAULT_PORT,
            concurrency: DEFAULT_CONCURRENCY,
            scratch_root: std::env::temp_dir(),
        }
    }
}

impl CliConfig {
    /// Use a different key store file
    pub fn with_key_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_store = path.into();
        self
    }

    /// Use different network settings
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }
}
