//! credvault: a local-first encrypted credential vault.
//!
//! Each user's credentials are serialized, sealed with AES-256-GCM under
//! a key derived from their master secret (Argon2id + HKDF), and stored
//! as one blob per user.  See [`vault::Vault`] for the entry point.

pub mod audit;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod vault;

pub use errors::{Result, VaultError};
pub use vault::{Credential, CredentialUpdate, SessionState, Vault, VaultSession};
