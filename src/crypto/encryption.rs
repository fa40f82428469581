//! AES-256-GCM authenticated encryption with a detached tag.
//!
//! Every call to `encrypt` draws a fresh random 12-byte nonce from the
//! OS generator.  There is no way to pass a nonce in, so a nonce can
//! never be reused by mistake under the same key.
//!
//! `decrypt` collapses every failure (wrong key, flipped bit, wrong
//! associated data, wrongly sized nonce or tag) into the single
//! `VaultError::Authentication`.

use aes_gcm::aead::{AeadInPlace, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce, Tag};

use super::keys::VaultKey;
use crate::errors::{Result, VaultError};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Output of one encryption: the three binary fields of a vault blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

/// Encrypt `plaintext` under `key`, authenticating `aad` alongside it.
pub fn encrypt(key: &VaultKey, plaintext: &[u8], aad: &[u8]) -> Result<Sealed> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // Encrypt in place so the tag comes back on its own.
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, aad, &mut buffer)
        .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    Ok(Sealed {
        nonce: nonce.to_vec(),
        ciphertext: buffer,
        tag: tag.to_vec(),
    })
}

/// Decrypt a `Sealed` value produced by `encrypt` with the same `aad`.
///
/// Tag verification is constant-time inside `aes-gcm`.
pub fn decrypt(key: &VaultKey, sealed: &Sealed, aad: &[u8]) -> Result<Vec<u8>> {
    // `from_slice` panics on a length mismatch, so check first.
    if sealed.nonce.len() != NONCE_LEN || sealed.tag.len() != TAG_LEN {
        return Err(VaultError::Authentication);
    }

    let nonce = Nonce::from_slice(&sealed.nonce);
    let tag = Tag::from_slice(&sealed.tag);

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| VaultError::Authentication)?;

    let mut buffer = sealed.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(nonce, aad, &mut buffer, tag)
        .map_err(|_| VaultError::Authentication)?;

    Ok(buffer)
}
