//! Cryptographic primitives for credvault.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption with a detached tag (`encryption`)
//! - Argon2id password-based key derivation (`kdf`)
//! - Zeroizing key types and the HKDF expand step (`keys`)

pub mod encryption;
pub mod kdf;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, derive_master_key, ...};
pub use encryption::{decrypt, encrypt, Sealed};
pub use kdf::{derive_master_key, generate_salt, KdfParams};
pub use keys::{MasterKey, VaultKey};
