//! Credential CRUD on an unlocked `VaultSession`.
//!
//! Reads work on the in-memory collection.  Every mutation rewrites the
//! whole collection: serialize, encrypt under the session key with a
//! fresh nonce, and replace the stored blob.  There are no incremental
//! updates.  All calls fail with `VaultError::NotUnlocked` once the
//! session is locked.

use uuid::Uuid;

use super::credential::{Credential, CredentialUpdate};
use super::session::VaultSession;
use crate::audit::AuditOp;
use crate::errors::{Result, VaultError};

impl VaultSession {
    /// All credentials, in insertion order.
    pub fn list(&self) -> Result<Vec<Credential>> {
        self.read(|credentials| Ok(credentials.to_vec()))
    }

    /// The credential with `id`.
    pub fn get(&self, id: Uuid) -> Result<Credential> {
        self.read(|credentials| {
            credentials
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .ok_or(VaultError::NotFound(id))
        })
    }

    /// Number of credentials in the vault.
    pub fn len(&self) -> Result<usize> {
        self.read(|credentials| Ok(credentials.len()))
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }

    /// Add a credential and persist the vault.
    ///
    /// The new record gets a random id and `created_at == updated_at`.
    pub fn create(&self, website: &str, username: &str, secret: &str) -> Result<Credential> {
        self.mutate(AuditOp::Create, |credentials| {
            let mut id = Uuid::new_v4();
            while credentials.iter().any(|c| c.id == id) {
                id = Uuid::new_v4();
            }

            let credential = Credential::new(
                id,
                website.to_string(),
                username.to_string(),
                secret.to_string(),
            );
            credentials.push(credential.clone());
            Ok((credential, Some(id)))
        })
    }

    /// Merge `fields` into the credential with `id` and persist the vault.
    pub fn update(&self, id: Uuid, fields: CredentialUpdate) -> Result<Credential> {
        self.mutate(AuditOp::Update, |credentials| {
            let credential = credentials
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or(VaultError::NotFound(id))?;

            credential.apply(fields);
            Ok((credential.clone(), Some(id)))
        })
    }

    /// Remove the credential with `id` and persist the vault.
    ///
    /// Removing the last credential still writes a valid, empty vault.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.mutate(AuditOp::Delete, |credentials| {
            let index = credentials
                .iter()
                .position(|c| c.id == id)
                .ok_or(VaultError::NotFound(id))?;

            credentials.remove(index);
            Ok(((), Some(id)))
        })
    }
}
