//! IPFS HTTP RPC storage backend

use crate::{NetworkConfig, Result, StorageAdapter, StorageError, StorageRef};
use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use std::future::Future;
use tracing::{debug, instrument, warn};

/// IPFS storage client
///
/// Blobs are added and pinned on the first reachable node of the node list.
/// Connection failures and timeouts fall through to the next node; any other
/// failure is returned as is. Unpinning is attempted on every node since a
/// blob may have been pinned on any of them.
#[derive(Clone)]
pub struct IpfsStorage {
    client: Client,
    config: NetworkConfig,
}

impl IpfsStorage {
    /// Create a new IPFS storage client
    pub fn new(config: NetworkConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from a single node URL
    pub fn from_url(url: &str) -> Result<Self> {
        Self::new(NetworkConfig::with_node(url))
    }

    /// The configuration in use
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    async fn with_failover<'a, T, F, Fut>(&'a self, op: &str, call: F) -> Result<T>
    where
        F: Fn(&'a str) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for node in &self.config.node_list {
            match call(node.as_str()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!(node = %node, error = %e, "IPFS {} failed, trying next node", op);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StorageError::Configuration("no IPFS nodes configured".to_string())
        }))
    }

    fn request_error(&self, err: reqwest::Error) -> StorageError {
        StorageError::from_request(err, self.config.timeout)
    }

    async fn add_on(&self, node: &str, name: &str, blob: &str) -> Result<StorageRef> {
        let url = format!("{}/api/v0/add?pin=true&cid-version=1", node);

        let part = multipart::Part::bytes(blob.as_bytes().to_vec())
            .file_name(name.to_string())
            .mime_str("text/plain")
            .map_err(|e| StorageError::Write(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(StorageError::Write(format!("Failed to add {}: {}", name, error)));
        }

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Write(e.to_string()))?;

        debug!(node = %node, hash = %added.hash, size = %added.size, "Added blob");
        Ok(StorageRef::new(added.hash))
    }

    async fn cat_on(&self, node: &str, storage_ref: &StorageRef) -> Result<String> {
        let url = format!("{}/api/v0/cat?arg={}", node, storage_ref);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            if response.status().as_u16() == 404 {
                return Err(StorageError::NotFound(storage_ref.to_string()));
            }
            let error = response.text().await.unwrap_or_default();
            return Err(StorageError::Read(format!(
                "Failed to cat {}: {}",
                storage_ref, error
            )));
        }

        response
            .text()
            .await
            .map_err(|e| StorageError::Read(e.to_string()))
    }

    async fn unpin_on(&self, node: &str, storage_ref: &StorageRef) -> Result<()> {
        let url = format!("{}/api/v0/pin/rm?arg={}", node, storage_ref);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(StorageError::Remove(format!(
                "Failed to unpin {}: {}",
                storage_ref, error
            )));
        }

        Ok(())
    }

    async fn reprovide_on(&self, node: &str) -> Result<()> {
        let url = format!("{}/api/v0/routing/reprovide", node);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(StorageError::Membership(format!(
                "Failed to reprovide: {}",
                error
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for IpfsStorage {
    #[instrument(skip(self, blob), fields(size = blob.len()))]
    async fn put(&self, name: &str, blob: &str) -> Result<StorageRef> {
        self.with_failover("add", |node| self.add_on(node, name, blob))
            .await
    }

    #[instrument(skip(self))]
    async fn get(&self, storage_ref: &StorageRef) -> Result<String> {
        self.with_failover("cat", |node| self.cat_on(node, storage_ref))
            .await
    }

    #[instrument(skip(self))]
    async fn remove(&self, storage_ref: &StorageRef) -> Result<()> {
        let mut unpinned = false;
        let mut last_error = None;

        for node in &self.config.node_list {
            match self.unpin_on(node, storage_ref).await {
                Ok(()) => unpinned = true,
                Err(e) => {
                    debug!(node = %node, error = %e, "Unpin failed");
                    last_error = Some(e);
                }
            }
        }

        match (unpinned, last_error) {
            (true, _) => Ok(()),
            (false, Some(e)) => Err(e),
            (false, None) => Err(StorageError::Configuration(
                "no IPFS nodes configured".to_string(),
            )),
        }
    }

    #[instrument(skip(self))]
    async fn refresh_membership(&self) -> Result<()> {
        if self.config.hidden {
            debug!("Hidden node, not announcing content");
            return Ok(());
        }
        self.with_failover("reprovide", |node| self.reprovide_on(node))
            .await
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

/// Response from /api/v0/add
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddResponse {
    pub name: String,
    pub hash: String,
    pub size: String,
}
