//! Key types and the HKDF-SHA256 expand step.
//!
//! The Argon2id output (`MasterKey`) is never used to encrypt directly.
//! It is expanded with HKDF (RFC 5869) under a fixed context label into
//! the `VaultKey` that the AEAD layer consumes, so the two roles stay
//! cryptographically separate.

use hkdf::Hkdf;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::{Result, VaultError};

/// Length of every key in this crate (256 bits).
pub const KEY_LEN: usize = 32;

/// HKDF `info` label for the blob encryption key.
const VAULT_KEY_INFO: &[u8] = b"credvault-vault-key:v1";

/// Raw Argon2id output.  Zeroed when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Copy raw key bytes into a new `MasterKey`.  The caller keeps
    /// ownership of (and zeroes) its own buffer.
    pub fn new(bytes: &[u8; KEY_LEN]) -> Self {
        Self { bytes: *bytes }
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Expand this master key into the key used to seal vault blobs.
    pub fn derive_vault_key(&self) -> Result<VaultKey> {
        let okm = hkdf_derive(&self.bytes, VAULT_KEY_INFO)?;
        Ok(VaultKey::new(&okm))
    }
}

/// The symmetric key a session holds while unlocked.  Zeroed when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    bytes: [u8; KEY_LEN],
}

impl VaultKey {
    pub fn new(bytes: &[u8; KEY_LEN]) -> Self {
        Self { bytes: *bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl PartialEq for VaultKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes[..].ct_eq(&other.bytes[..]).into()
    }
}

impl Eq for VaultKey {}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey(<redacted>)")
    }
}

/// Internal helper: run HKDF-SHA256 expand with the given `info`.
///
/// The extract step uses no salt because the input already came out of
/// Argon2id with a per-vault salt.
fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(info, okm.as_mut_slice())
        .map_err(|e| VaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_key_is_deterministic_and_distinct_from_master() {
        let master = MasterKey::new(&[0x42; KEY_LEN]);
        let a = master.derive_vault_key().unwrap();
        let b = master.derive_vault_key().unwrap();

        assert_eq!(a, b);
        assert_ne!(a.as_bytes(), master.as_bytes());
    }

    #[test]
    fn zeroize_clears_key_bytes() {
        let mut master = MasterKey::new(&[0x42; KEY_LEN]);
        let mut key = master.derive_vault_key().unwrap();

        master.zeroize();
        key.zeroize();

        assert_eq!(master.as_bytes(), &[0u8; KEY_LEN]);
        assert_eq!(key.as_bytes(), &[0u8; KEY_LEN]);
    }

    #[test]
    fn constructors_copy_without_consuming_the_source() {
        let mut raw = Zeroizing::new([0x17u8; KEY_LEN]);
        let key = VaultKey::new(&raw);
        raw.zeroize();

        assert_eq!(key.as_bytes(), &[0x17u8; KEY_LEN]);
        assert_eq!(*raw, [0u8; KEY_LEN]);
    }
}
