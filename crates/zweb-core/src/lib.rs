//! # z-web Core
//!
//! Site synchronization engine: publishes a directory tree as a named site
//! into a content-addressable network and reconstructs it locally.
//!
//! This crate provides:
//! - **Key Store**: site name -> per-file storage reference and key
//! - **Tree Walker**: lazy depth-first enumeration of a site's files
//! - **Site Sync**: publish, fetch and remove
//! - **Scratch directories**: clean per-site working directories
//! - **Site server**: serves a fetched site over HTTP
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           zweb-cli (z-web)              │
//! ├─────────────────────────────────────────┤
//! │               SiteSync                  │
//! ├──────────┬─────────────┬────────────────┤
//! │ KeyStore │ TreeWalker  │ Scratch/Server │
//! ├──────────┴──────┬──────┴────────────────┤
//! │   zweb-crypto   │     zweb-storage      │
//! └─────────────────┴───────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use zweb_core::{KeyStore, SiteSync};
//! use zweb_storage::{connect, NetworkConfig};
//!
//! let storage = connect(&NetworkConfig::default()).await?;
//! let sync = SiteSync::new(KeyStore::at_default_path(), storage);
//!
//! sync.publish("blog", "./public").await?;
//! let mut site = sync.fetch("blog").await?;
//! site.start(3001).await?;
//! ```

pub mod error;
pub mod keystore;
pub mod scratch;
pub mod server;
pub mod sync;
pub mod walker;

pub use error::{Result, SyncError};
pub use keystore::{FileKeyEntry, KeyStore, KeyStoreDocument, SiteRecord};
pub use server::{SiteHandle, SiteServer};
pub use sync::{PublishReport, RemoveReport, SiteSummary, SiteSync, SyncConfig};
pub use walker::TreeWalker;
