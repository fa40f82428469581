//! Vault module: encrypted credential storage.
//!
//! This module provides:
//! - `Credential`, `CredentialUpdate` and `User` types (`credential`)
//! - The at-rest `VaultBlob` JSON format (`blob`)
//! - The `VaultStore` persistence trait with file and memory backends (`store`)
//! - `Vault` / `VaultSession` for unlocking and locking (`session`)
//! - Credential CRUD on an unlocked session (`repository`)

pub mod blob;
pub mod credential;
mod repository;
pub mod session;
pub mod store;

// Re-export the most commonly used items.
pub use blob::{storage_key, VaultBlob, CURRENT_VERSION};
pub use credential::{Credential, CredentialUpdate, User};
pub use session::{SessionState, Vault, VaultSession};
pub use store::{FileVaultStore, MemoryVaultStore, VaultStore};
