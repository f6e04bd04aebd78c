//! AES-256-CBC file encryption
//!
//! Sealed output format: `IV (16 bytes) || CBC ciphertext (PKCS#7 padded)`.
//! The blob carries everything needed to decrypt except the key.
//!
//! There is no authentication tag. A ciphertext that was tampered with but
//! still has valid padding decrypts to garbage instead of failing.

use crate::{
    keys::{FileKey, Iv, IV_SIZE},
    CryptoError, Result,
};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// The result of encrypting one file
#[derive(Clone, Debug)]
pub struct SealedFile {
    /// The freshly generated key for this file
    pub key: FileKey,
    /// `IV || ciphertext`
    pub ciphertext: Vec<u8>,
}

/// Encrypt with a newly generated key and IV
pub fn encrypt_file(plaintext: &[u8]) -> Result<SealedFile> {
    let key = FileKey::generate();
    let ciphertext = encrypt_with(&key, &Iv::generate(), plaintext)?;
    Ok(SealedFile { key, ciphertext })
}

/// Encrypt with caller-provided key material
pub fn encrypt_with(key: &FileKey, iv: &Iv, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), iv.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let body = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(IV_SIZE + body.len());
    out.extend_from_slice(iv.as_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decrypt a sealed blob produced by [`encrypt_file`]
pub fn decrypt_file(ciphertext: &[u8], key: &FileKey) -> Result<Vec<u8>> {
    if ciphertext.len() < IV_SIZE + BLOCK_SIZE {
        return Err(CryptoError::InvalidCiphertext(format!(
            "sealed file must be at least {} bytes, got {}",
            IV_SIZE + BLOCK_SIZE,
            ciphertext.len()
        )));
    }

    let (iv, body) = ciphertext.split_at(IV_SIZE);
    if body.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidCiphertext(format!(
            "ciphertext length {} is not a multiple of the block size",
            body.len()
        )));
    }

    let iv = Iv::from_bytes(iv)?;
    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), iv.as_bytes())
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(body)
        .map_err(|e| CryptoError::Decryption(e.to_string()))
}
