//! Publish, fetch and remove sites
//!
//! Each operation is a straight-line async protocol with no intermediate
//! state kept on disk. The key store is only written once every backend
//! call an operation depends on has finished.

use crate::{
    keystore::{FileKeyEntry, KeyStore, SiteRecord},
    scratch::{self, resolve_in, scratch_dir_for},
    server::SiteHandle,
    walker::{relative_key, TreeWalker},
    Result, SyncError,
};
use futures::{stream, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use zweb_crypto::transport;
use zweb_storage::StorageAdapter;

/// Default number of files transferred at once
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Tunables for site operations
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Parent of the per-site scratch directories
    pub scratch_root: PathBuf,
    /// Maximum in-flight uploads or downloads
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl SyncConfig {
    /// Set the scratch root
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    /// Set the transfer concurrency (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Outcome of a successful publish
#[derive(Clone, Debug)]
pub struct PublishReport {
    pub name: String,
    pub files: usize,
    /// Set when the membership refresh after publishing failed
    pub membership_error: Option<String>,
}

/// Outcome of a remove
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoveReport {
    /// Whether a record existed
    pub existed: bool,
    /// Blobs the backend released
    pub released: usize,
    /// Blobs the backend failed to release (leaked)
    pub failed: usize,
}

/// A published site as listed from the key store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteSummary {
    pub name: String,
    pub files: usize,
}

/// Orchestrates the key store, crypto and storage network
pub struct SiteSync {
    key_store: KeyStore,
    storage: Arc<dyn StorageAdapter>,
    config: SyncConfig,
}

impl SiteSync {
    /// Create with the default configuration
    pub fn new(key_store: KeyStore, storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            key_store,
            storage,
            config: SyncConfig::default(),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.key_store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Publish `root` as `name`, replacing any previous publish
    ///
    /// Every file is sealed with its own key and stored under its absolute
    /// path. The record is persisted only after all uploads succeeded; a
    /// failed upload leaves the key store without the site.
    #[instrument(skip(self, root), fields(root = %root.as_ref().display()))]
    pub async fn publish(&self, name: &str, root: impl AsRef<Path>) -> Result<PublishReport> {
        let root = root.as_ref();
        match tokio::fs::metadata(root).await {
            Ok(metadata) if metadata.is_dir() => {}
            _ => return Err(SyncError::NotADirectory(root.to_path_buf())),
        }
        let root = tokio::fs::canonicalize(root).await?;

        self.remove(name).await?;

        let file_keys: BTreeMap<String, FileKeyEntry> = TreeWalker::new(&root)
            .into_stream()
            .map_ok(|path| self.upload(&root, path))
            .try_buffer_unordered(self.config.concurrency)
            .try_collect()
            .await?;

        let files = file_keys.len();
        let mut document = self.key_store.load().await;
        document.upsert(SiteRecord {
            name: name.to_string(),
            file_keys,
        });
        self.key_store.save(&document).await?;

        info!(site = %name, files, "Finished upload");

        let membership_error = match self.storage.refresh_membership().await {
            Ok(()) => None,
            Err(e) => {
                warn!(site = %name, error = %e, "Membership refresh failed");
                Some(e.to_string())
            }
        };

        Ok(PublishReport {
            name: name.to_string(),
            files,
            membership_error,
        })
    }

    async fn upload(&self, root: &Path, path: PathBuf) -> Result<(String, FileKeyEntry)> {
        let key = relative_key(root, &path)
            .ok_or_else(|| SyncError::InvalidPath(path.display().to_string()))?;

        info!("Uploading {}", path.display());

        let raw = tokio::fs::read(&path)
            .await
            .map_err(|source| SyncError::Traversal {
                path: path.clone(),
                source,
            })?;

        let (file_key, blob) = transport::seal(&raw).map_err(|source| SyncError::Encryption {
            path: path.clone(),
            source,
        })?;

        let storage_key = self
            .storage
            .put(&path.to_string_lossy(), &blob)
            .await
            .map_err(|source| SyncError::StorageWrite {
                path: path.clone(),
                source,
            })?;

        Ok((
            key,
            FileKeyEntry {
                storage_key,
                key: file_key,
            },
        ))
    }

    /// Materialize `name` into a clean scratch directory
    ///
    /// Fails with [`SyncError::SiteNotFound`] before touching the filesystem
    /// when the site is unknown. A failed download leaves the scratch
    /// directory partially populated.
    #[instrument(skip(self))]
    pub async fn fetch(&self, name: &str) -> Result<SiteHandle> {
        let document = self.key_store.load().await;
        let record = document
            .find(name)
            .ok_or_else(|| SyncError::SiteNotFound(name.to_string()))?;

        let dir = scratch_dir_for(&self.config.scratch_root, name);
        scratch::ensure_clean(&dir).await?;

        stream::iter(record.file_keys.iter().map(Ok::<_, SyncError>))
            .try_for_each_concurrent(self.config.concurrency, |(key, entry)| {
                self.download(&dir, key, entry)
            })
            .await?;

        info!(site = %name, files = record.len(), "Finished download");
        Ok(SiteHandle::new(name, dir, record.len()))
    }

    async fn download(&self, dir: &Path, key: &str, entry: &FileKeyEntry) -> Result<()> {
        let target = resolve_in(dir, key)?;

        info!("Downloading {}", key);

        let blob = self
            .storage
            .get(&entry.storage_key)
            .await
            .map_err(|source| SyncError::StorageRead {
                path: key.to_string(),
                source,
            })?;

        let raw = transport::open(&blob, &entry.key).map_err(|source| SyncError::Decryption {
            path: key.to_string(),
            source,
        })?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, raw).await?;
        Ok(())
    }

    /// Release every blob of `name` and forget it
    ///
    /// Unknown names are a no-op. Backend failures are logged and counted
    /// but never stop the record from being deleted.
    #[instrument(skip(self))]
    pub async fn remove(&self, name: &str) -> Result<RemoveReport> {
        let mut document = self.key_store.load().await;
        let Some(record) = document.remove(name) else {
            return Ok(RemoveReport::default());
        };

        let outcomes: Vec<bool> = stream::iter(record.file_keys.iter())
            .map(|(key, entry)| async move {
                info!("Removing {}", key);
                match self.storage.remove(&entry.storage_key).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(file = %key, storage_key = %entry.storage_key, error = %e, "Failed to release blob");
                        false
                    }
                }
            })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let released = outcomes.iter().filter(|ok| **ok).count();
        let report = RemoveReport {
            existed: true,
            released,
            failed: outcomes.len() - released,
        };

        self.key_store.save(&document).await?;

        info!(site = %name, released = report.released, failed = report.failed, "Removed site");
        Ok(report)
    }

    /// Sites in the key store
    pub async fn list(&self) -> Vec<SiteSummary> {
        self.key_store
            .load()
            .await
            .sites()
            .iter()
            .map(|site| SiteSummary {
                name: site.name.clone(),
                files: site.len(),
            })
            .collect()
    }
}
