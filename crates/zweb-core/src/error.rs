//! Error types for the zweb-core crate

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `SyncError`
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during site operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// A directory could not be listed or an entry could not be inspected
    #[error("cannot traverse {path}: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The storage network rejected a blob
    #[error("failed to store {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: zweb_storage::StorageError,
    },

    /// A stored blob could not be retrieved
    #[error("failed to retrieve {path}: {source}")]
    StorageRead {
        path: String,
        #[source]
        source: zweb_storage::StorageError,
    },

    /// A blob did not decrypt with its recorded key
    #[error("failed to decrypt {path}: {source}")]
    Decryption {
        path: String,
        #[source]
        source: zweb_crypto::CryptoError,
    },

    /// Encryption failed
    #[error("failed to encrypt {path}: {source}")]
    Encryption {
        path: PathBuf,
        #[source]
        source: zweb_crypto::CryptoError,
    },

    /// The key store could not be written
    #[error("failed to save key store {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No site is published under this name
    #[error("site does not exist: {0}")]
    SiteNotFound(String),

    /// Publish root is missing or not a directory
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A recorded relative path would escape the scratch directory
    #[error("invalid site path: {0}")]
    InvalidPath(String),

    /// The site server is already listening
    #[error("site server already running on {0}")]
    ServerAlreadyRunning(std::net::SocketAddr),

    /// The site server failed
    #[error("site server error: {0}")]
    Server(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Check if this is a "site not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SiteNotFound(_))
    }
}
