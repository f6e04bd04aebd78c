//! Text-safe envelope for storing files in the network
//!
//! The storage interface carries text, so both sides of the cipher are hex:
//!
//! ```text
//! seal: raw bytes -> hex -> AES-256-CBC -> hex blob
//! open: hex blob -> bytes -> AES-256-CBC -> hex -> raw bytes
//! ```
//!
//! Encoding the plaintext as hex before encrypting doubles the payload. It is
//! kept so blobs stay readable by existing z-web key stores.

use crate::{
    cipher::{decrypt_file, encrypt_file},
    keys::FileKey,
    Result,
};

/// Encrypt raw file bytes into a hex blob ready for `put`
pub fn seal(raw: &[u8]) -> Result<(FileKey, String)> {
    let plaintext = hex::encode(raw);
    let sealed = encrypt_file(plaintext.as_bytes())?;
    Ok((sealed.key, hex::encode(&sealed.ciphertext)))
}

/// Recover raw file bytes from a hex blob returned by `get`
pub fn open(blob: &str, key: &FileKey) -> Result<Vec<u8>> {
    let ciphertext = hex::decode(blob.trim())?;
    let plaintext = decrypt_file(&ciphertext, key)?;
    Ok(hex::decode(plaintext)?)
}
