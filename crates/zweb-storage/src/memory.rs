//! In-memory storage for testing and development

use crate::{Result, StorageAdapter, StorageError, StorageRef};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug)]
struct StoredBlob {
    name: String,
    blob: String,
}

/// An in-memory content-addressable store
///
/// References are the BLAKE3 digest of the blob, hex encoded.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    blobs: Arc<DashMap<StorageRef, StoredBlob>>,
    refreshes: Arc<AtomicUsize>,
}

impl MemoryStorage {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of blobs stored
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Check whether a reference resolves
    pub fn contains(&self, storage_ref: &StorageRef) -> bool {
        self.blobs.contains_key(storage_ref)
    }

    /// Logical name a blob was stored under
    pub fn name_of(&self, storage_ref: &StorageRef) -> Option<String> {
        self.blobs.get(storage_ref).map(|entry| entry.name.clone())
    }

    /// Overwrite a stored blob in place (for corruption tests)
    pub fn replace(&self, storage_ref: &StorageRef, blob: impl Into<String>) {
        if let Some(mut entry) = self.blobs.get_mut(storage_ref) {
            entry.blob = blob.into();
        }
    }

    /// How many times membership was refreshed
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Clear all blobs
    pub fn clear(&self) {
        self.blobs.clear();
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn put(&self, name: &str, blob: &str) -> Result<StorageRef> {
        let storage_ref = StorageRef::new(blake3::hash(blob.as_bytes()).to_hex().to_string());
        self.blobs.insert(
            storage_ref.clone(),
            StoredBlob {
                name: name.to_string(),
                blob: blob.to_string(),
            },
        );
        Ok(storage_ref)
    }

    async fn get(&self, storage_ref: &StorageRef) -> Result<String> {
        self.blobs
            .get(storage_ref)
            .map(|entry| entry.blob.clone())
            .ok_or_else(|| StorageError::NotFound(storage_ref.to_string()))
    }

    async fn remove(&self, storage_ref: &StorageRef) -> Result<()> {
        self.blobs.remove(storage_ref);
        Ok(())
    }

    async fn refresh_membership(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
