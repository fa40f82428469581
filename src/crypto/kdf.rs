//! Password-based key derivation using Argon2id.
//!
//! Argon2id is a memory-hard KDF that protects against brute-force and
//! GPU-based attacks.  Parameters are configurable via `KdfParams`
//! (loaded from `credvault.toml` or sensible defaults) but can never go
//! below the fixed floors defined here.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::Zeroizing;

use super::keys::{MasterKey, KEY_LEN};
use crate::errors::{Result, VaultError};

/// Length of the salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Shortest salt accepted from a stored blob.
pub const MIN_SALT_LEN: usize = 16;

/// Minimum safe memory cost in KiB (8 MB).
pub const MIN_MEMORY_KIB: u32 = 8_192;

/// Minimum number of Argon2 passes.
pub const MIN_ITERATIONS: u32 = 2;

/// Minimum parallelism lanes.
pub const MIN_PARALLELISM: u32 = 1;

/// Validated Argon2id cost parameters.
///
/// The fields are private so every instance has gone through
/// [`KdfParams::new`], which rejects values below the floors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Build a parameter set, refusing anything weaker than the floors.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        if memory_kib < MIN_MEMORY_KIB {
            return Err(VaultError::KeyDerivationFailed(format!(
                "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {memory_kib})"
            )));
        }
        if iterations < MIN_ITERATIONS {
            return Err(VaultError::KeyDerivationFailed(format!(
                "Argon2 iterations must be at least {MIN_ITERATIONS} (got {iterations})"
            )));
        }
        if parallelism < MIN_PARALLELISM {
            return Err(VaultError::KeyDerivationFailed(format!(
                "Argon2 parallelism must be at least {MIN_PARALLELISM} (got {parallelism})"
            )));
        }

        // Let argon2 reject combinations it cannot run (e.g. too many lanes
        // for the memory budget) up front rather than at derive time.
        Params::new(memory_kib, iterations, parallelism, Some(KEY_LEN))
            .map_err(|e| VaultError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

        Ok(Self {
            memory_kib,
            iterations,
            parallelism,
        })
    }

    /// Cheapest parameters still above the floors.
    pub fn minimum() -> Self {
        Self {
            memory_kib: MIN_MEMORY_KIB,
            iterations: MIN_ITERATIONS,
            parallelism: MIN_PARALLELISM,
        }
    }

    pub fn memory_kib(&self) -> u32 {
        self.memory_kib
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }
}

/// Derive a 32-byte master key from a secret and salt using Argon2id.
///
/// The same secret + salt + params always produce the same key.  Every
/// secret is accepted, including the empty one: whether it was the right
/// secret is only decided later by the AEAD tag.
pub fn derive_master_key(secret: &[u8], salt: &[u8], params: &KdfParams) -> Result<MasterKey> {
    let argon2_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| VaultError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(secret, salt, key.as_mut_slice())
        .map_err(|e| VaultError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    Ok(MasterKey::new(&key))
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
