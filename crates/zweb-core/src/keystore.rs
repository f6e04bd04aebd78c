//! Local index of published sites
//!
//! The whole index is one JSON document. Every mutation is a read-modify-write
//! of the full document; there is no locking between processes.

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zweb_crypto::FileKey;
use zweb_storage::StorageRef;

/// File name of the key store inside the home directory
pub const DEFAULT_KEY_STORE_NAME: &str = ".z-web-store";

/// Where one file of a site lives and how to decrypt it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileKeyEntry {
    pub storage_key: StorageRef,
    pub key: FileKey,
}

/// A published site: relative path -> file entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRecord {
    pub name: String,
    #[serde(default)]
    pub file_keys: BTreeMap<String, FileKeyEntry>,
}

impl SiteRecord {
    /// Create a record with no files
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_keys: BTreeMap::new(),
        }
    }

    /// Number of files in the site
    pub fn len(&self) -> usize {
        self.file_keys.len()
    }

    /// Whether the site has no files
    pub fn is_empty(&self) -> bool {
        self.file_keys.is_empty()
    }
}

/// Ordered list of site records with unique names
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyStoreDocument {
    sites: Vec<SiteRecord>,
}

impl KeyStoreDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a site by name
    pub fn find(&self, name: &str) -> Option<&SiteRecord> {
        self.sites.iter().find(|site| site.name == name)
    }

    /// Insert a site, replacing any record with the same name in place
    pub fn upsert(&mut self, record: SiteRecord) {
        match self.sites.iter_mut().find(|site| site.name == record.name) {
            Some(existing) => *existing = record,
            None => self.sites.push(record),
        }
    }

    /// Remove a site by name
    pub fn remove(&mut self, name: &str) -> Option<SiteRecord> {
        let index = self.sites.iter().position(|site| site.name == name)?;
        Some(self.sites.remove(index))
    }

    /// Site names in document order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sites.iter().map(|site| site.name.as_str())
    }

    /// All records in document order
    pub fn sites(&self) -> &[SiteRecord] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Handle to the key store file
#[derive(Clone, Debug)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    /// Use the key store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the key store at [`KeyStore::default_path`]
    pub fn at_default_path() -> Self {
        Self::new(Self::default_path())
    }

    /// `~/.z-web-store`, or `./.z-web-store` when there is no home directory
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_KEY_STORE_NAME)
    }

    /// The backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document. A missing, unreadable or malformed file is an
    /// empty store.
    pub async fn load(&self) -> KeyStoreDocument {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No key store yet");
                return KeyStoreDocument::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot read key store, treating as empty");
                return KeyStoreDocument::new();
            }
        };

        match serde_json::from_str(&data) {
            Ok(document) => document,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Malformed key store, treating as empty");
                KeyStoreDocument::new()
            }
        }
    }

    /// Replace the file with the given document
    ///
    /// Written to a sibling temp file first and renamed over the target, so
    /// readers see either the old or the new document.
    pub async fn save(&self, document: &KeyStoreDocument) -> Result<()> {
        let persistence = |source| SyncError::Persistence {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_vec(document)
            .map_err(|e| persistence(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(persistence)?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &json).await.map_err(persistence)?;
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(persistence(e));
        }

        debug!(path = %self.path.display(), sites = document.len(), "Saved key store");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_KEY_STORE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
