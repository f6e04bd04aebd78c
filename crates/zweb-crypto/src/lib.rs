//! # z-web Crypto
//!
//! Per-file encryption for published z-web sites.
//!
//! This crate provides:
//! - **File keys**: a fresh 256-bit key per file, never reused
//! - **AES-256-CBC**: sealing with the IV prepended to the ciphertext
//! - **Transport envelope**: hex in, hex out, so blobs are plain text
//!
//! ## Example
//!
//! ```rust,ignore
//! use zweb_crypto::transport;
//!
//! let (key, blob) = transport::seal(b"<h1>Hello</h1>")?;
//! let raw = transport::open(&blob, &key)?;
//! ```

pub mod cipher;
pub mod error;
pub mod keys;
pub mod transport;

pub use cipher::{decrypt_file, encrypt_file, SealedFile};
pub use error::{CryptoError, Result};
pub use keys::{FileKey, Iv, IV_SIZE, KEY_SIZE};
