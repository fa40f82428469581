//! Unlocking, locking and persisting a user's vault.
//!
//! `Vault` is the entry point.  It owns the blob store and the KDF
//! parameters used for brand-new vaults.  `Vault::unlock` hands back a
//! `VaultSession`, which holds the derived key and the plaintext
//! credentials until it is locked or dropped.
//!
//! At most one session per user id and store is unlocked at a time in
//! the process, however many `Vault` values point at that store.  The
//! registry enforcing this holds only identifiers.
//!
//! Session states:
//!
//! ```text
//! Locked --unlock--> Unlocking --ok--> Unlocked --lock/drop--> Locked
//!                        |
//!                        +--error--> Locked   (stored blob untouched)
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use uuid::Uuid;
use zeroize::Zeroizing;

use super::blob::{self, VaultBlob, CURRENT_VERSION};
use super::credential::Credential;
use super::store::{FileVaultStore, VaultStore};
use crate::audit::AuditOp;
use crate::config::Settings;
use crate::crypto::kdf::{derive_master_key, generate_salt, KdfParams};
use crate::crypto::{decrypt, encrypt, VaultKey};
use crate::errors::{Result, VaultError};

#[cfg(feature = "audit-log")]
use crate::audit::AuditLog;

/// Observable lifecycle state of a `VaultSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Locked,
    Unlocking,
    Unlocked,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Shared state behind every `Vault` clone and every session it opened.
struct VaultShared {
    store: Arc<dyn VaultStore>,

    /// Parameters for vaults created from now on.  Existing vaults keep
    /// the parameters stored in their blob.
    kdf: KdfParams,

    /// `VaultStore::store_id` of `store`, captured once.
    store_id: String,

    #[cfg(feature = "audit-log")]
    audit: Option<Mutex<AuditLog>>,
}

/// `(store id, user id)` pairs with a session in `Unlocking` or `Unlocked`.
type Registry = HashSet<(String, String)>;

/// The process-wide unlock registry.
fn registry() -> MutexGuard<'static, Registry> {
    static ACTIVE: OnceLock<Mutex<Registry>> = OnceLock::new();
    ACTIVE
        .get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

impl VaultShared {
    fn registry_key(&self, user_id: &str) -> (String, String) {
        (self.store_id.clone(), user_id.to_string())
    }

    fn reserve(&self, user_id: &str) -> Result<()> {
        if !registry().insert(self.registry_key(user_id)) {
            return Err(VaultError::AlreadyUnlocked(user_id.to_string()));
        }
        Ok(())
    }

    fn release(&self, user_id: &str) {
        registry().remove(&self.registry_key(user_id));
    }

    /// Record an operation in the audit log, if one is configured.
    /// Never fails the calling operation.
    fn audit(&self, op: AuditOp, user_id: &str, credential: Option<Uuid>, details: Option<&str>) {
        #[cfg(feature = "audit-log")]
        {
            if let Some(log) = &self.audit {
                if let Ok(log) = log.lock() {
                    log.log(op, user_id, credential, details);
                }
            }
        }

        #[cfg(not(feature = "audit-log"))]
        let _ = (op, user_id, credential, details);
    }
}

/// Entry point for opening per-user vaults.
///
/// Cheap to clone; clones share the store and the audit log.
#[derive(Clone)]
pub struct Vault {
    shared: Arc<VaultShared>,
}

impl Vault {
    /// Create a vault over `store`, using `kdf` for newly created vaults.
    pub fn new<S: VaultStore + 'static>(store: S, kdf: KdfParams) -> Self {
        Self::build(Arc::new(store), kdf, None)
    }

    /// Like `new`, but records every operation in `audit`.
    #[cfg(feature = "audit-log")]
    pub fn with_audit_log<S: VaultStore + 'static>(
        store: S,
        kdf: KdfParams,
        audit: AuditLog,
    ) -> Self {
        Self::build(Arc::new(store), kdf, Some(audit))
    }

    /// Build a file-backed vault from settings.
    ///
    /// Blobs go to `<project_dir>/<store_dir>`.  When `audit_log` is
    /// enabled the audit database lives in the same directory; if it
    /// cannot be opened the vault works without it.
    pub fn from_settings(project_dir: &Path, settings: &Settings) -> Result<Self> {
        let kdf = settings.kdf_params()?;
        let store_dir = settings.store_path(project_dir);
        let store = FileVaultStore::open(&store_dir)?;

        #[cfg(feature = "audit-log")]
        let audit = if settings.audit_log {
            let log = AuditLog::open(&store_dir);
            if log.is_none() {
                tracing::warn!(
                    dir = %store_dir.display(),
                    "audit log unavailable, continuing without it"
                );
            }
            log
        } else {
            None
        };
        #[cfg(not(feature = "audit-log"))]
        let audit = None;

        Ok(Self::build(Arc::new(store), kdf, audit))
    }

    #[cfg(feature = "audit-log")]
    fn build(store: Arc<dyn VaultStore>, kdf: KdfParams, audit: Option<AuditLog>) -> Self {
        Self {
            shared: Arc::new(VaultShared {
                store_id: store.store_id(),
                store,
                kdf,
                audit: audit.map(Mutex::new),
            }),
        }
    }

    #[cfg(not(feature = "audit-log"))]
    fn build(store: Arc<dyn VaultStore>, kdf: KdfParams, _audit: Option<()>) -> Self {
        Self {
            shared: Arc::new(VaultShared {
                store_id: store.store_id(),
                store,
                kdf,
            }),
        }
    }

    /// Unlock the vault belonging to `user_id`.
    ///
    /// - No stored blob: a new vault with a fresh salt and no credentials.
    ///   Nothing is written until the first mutation.
    /// - Stored blob: the key is re-derived from the blob's salt and KDF
    ///   parameters and the blob is decrypted.
    ///
    /// A wrong secret or tampered blob fails with
    /// `VaultError::Authentication`; the stored blob is never modified
    /// and no empty vault is handed out in its place.
    pub fn unlock(&self, user_id: &str, master_secret: &str) -> Result<VaultSession> {
        self.shared.reserve(user_id)?;

        let session = VaultSession {
            shared: Arc::clone(&self.shared),
            user_id: user_id.to_string(),
            state: Mutex::new(State::Unlocking),
        };

        match session.open(master_secret.as_bytes()) {
            Ok(count) => {
                tracing::info!(user_id, count, "vault unlocked");
                self.shared.audit(AuditOp::Unlock, user_id, None, None);
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "vault unlock failed");
                self.shared
                    .audit(AuditOp::UnlockFailed, user_id, None, Some(&e.to_string()));
                Err(e)
            }
        }
    }

    /// Delete the stored blob for `user_id`.
    ///
    /// This is the only way a vault is removed from storage.  Refused
    /// while a session for that user is unlocked.
    pub fn reset(&self, user_id: &str) -> Result<()> {
        // Hold the registry so no unlock can start while deleting.
        let active = registry();
        if active.contains(&self.shared.registry_key(user_id)) {
            return Err(VaultError::AlreadyUnlocked(user_id.to_string()));
        }
        self.shared.store.delete(user_id)?;
        drop(active);

        tracing::info!(user_id, "vault reset");
        self.shared.audit(AuditOp::Reset, user_id, None, None);
        Ok(())
    }

    /// Returns `true` if a blob is stored for `user_id`.
    pub fn exists(&self, user_id: &str) -> Result<bool> {
        Ok(self.shared.store.get(user_id)?.is_some())
    }

    /// Returns `true` if `user_id` currently has an unlocked session on
    /// this vault's store, opened through any `Vault`.
    pub fn is_unlocked(&self, user_id: &str) -> bool {
        registry().contains(&self.shared.registry_key(user_id))
    }
}

// ---------------------------------------------------------------------------
// VaultSession
// ---------------------------------------------------------------------------

enum State {
    Locked,
    Unlocking,
    Unlocked(OpenVault),
}

/// Everything held in memory while a session is unlocked.
struct OpenVault {
    /// Zeroed on drop.
    key: VaultKey,
    salt: Vec<u8>,
    kdf: KdfParams,
    /// Secrets are zeroed on drop (see `Credential`).
    credentials: Vec<Credential>,
}

/// Handle to one user's unlocked vault.
///
/// All methods take `&self`; the session can be shared across threads
/// behind an `Arc`.  Mutations are serialized by an internal lock held
/// across "mutate, encrypt, persist".
pub struct VaultSession {
    shared: Arc<VaultShared>,
    user_id: String,
    state: Mutex<State>,
}

impl VaultSession {
    /// The user this session belongs to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> SessionState {
        match *self.guard() {
            State::Locked => SessionState::Locked,
            State::Unlocking => SessionState::Unlocking,
            State::Unlocked(_) => SessionState::Unlocked,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.state() == SessionState::Unlocked
    }

    /// Discard the key and plaintext credentials and move to `Locked`.
    ///
    /// Calling it again, or on a session that never unlocked, does nothing.
    pub fn lock(&self) {
        let mut state = self.guard();
        if !matches!(*state, State::Unlocked(_)) {
            return;
        }

        // Dropping the old state zeroes the key and every secret.
        drop(std::mem::replace(&mut *state, State::Locked));
        self.shared.release(&self.user_id);
        drop(state);

        tracing::info!(user_id = %self.user_id, "vault locked");
        self.shared
            .audit(AuditOp::Lock, &self.user_id, None, None);
    }

    /// Re-key the vault under a new master secret.
    ///
    /// The salt and KDF parameters stay the same; only the secret
    /// changes.  The collection is re-encrypted and persisted before the
    /// session switches to the new key, so a failed write leaves the old
    /// secret in force.
    pub fn change_master_secret(&self, new_secret: &str) -> Result<()> {
        let mut state = self.guard();
        let open = unlocked(&mut state)?;

        let master = derive_master_key(new_secret.as_bytes(), &open.salt, &open.kdf)?;
        let key = master.derive_vault_key()?;
        drop(master);

        let blob = seal(&key, &self.user_id, &open.salt, open.kdf, &open.credentials)?;
        self.shared.store.put(&self.user_id, &blob)?;
        open.key = key;
        let count = open.credentials.len();
        drop(state);

        tracing::info!(user_id = %self.user_id, count, "master secret changed");
        self.shared
            .audit(AuditOp::RotateSecret, &self.user_id, None, None);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Crate-internal plumbing for the repository
    // ------------------------------------------------------------------

    /// Lock the state.  A panic in another thread cannot leave the state
    /// half-mutated (memory is only replaced after a successful persist),
    /// so a poisoned lock is recovered rather than propagated.
    fn guard(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the credentials while unlocked.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&[Credential]) -> Result<T>) -> Result<T> {
        let mut state = self.guard();
        let open = unlocked(&mut state)?;
        f(open.credentials.as_slice())
    }

    /// Apply `f` to a copy of the credentials, persist the copy, and
    /// only then make it the in-memory collection.
    ///
    /// The state lock is held for the whole sequence so concurrent
    /// mutations cannot interleave their persists.
    pub(crate) fn mutate<T>(
        &self,
        op: AuditOp,
        f: impl FnOnce(&mut Vec<Credential>) -> Result<(T, Option<Uuid>)>,
    ) -> Result<T> {
        let mut state = self.guard();
        let open = unlocked(&mut state)?;

        let mut next = open.credentials.clone();
        let (out, credential_id) = f(&mut next)?;

        let blob = seal(&open.key, &self.user_id, &open.salt, open.kdf, &next)?;
        self.shared.store.put(&self.user_id, &blob)?;
        open.credentials = next;
        let count = open.credentials.len();
        drop(state);

        tracing::debug!(user_id = %self.user_id, %op, count, "vault persisted");
        self.shared.audit(op, &self.user_id, credential_id, None);
        Ok(out)
    }

    /// `Unlocking` → `Unlocked` on success, `Locked` on failure.
    /// Returns the number of credentials loaded.
    fn open(&self, secret: &[u8]) -> Result<usize> {
        let loaded = self.load(secret);

        let mut state = self.guard();
        match loaded {
            Ok(vault) => {
                let count = vault.credentials.len();
                *state = State::Unlocked(vault);
                Ok(count)
            }
            Err(e) => {
                *state = State::Locked;
                self.shared.release(&self.user_id);
                Err(e)
            }
        }
    }

    fn load(&self, secret: &[u8]) -> Result<OpenVault> {
        let Some(blob) = self.shared.store.get(&self.user_id)? else {
            let salt = generate_salt().to_vec();
            let kdf = self.shared.kdf;
            let key = derive_master_key(secret, &salt, &kdf)?.derive_vault_key()?;
            tracing::debug!(user_id = %self.user_id, "no stored vault, starting empty");
            return Ok(OpenVault {
                key,
                salt,
                kdf,
                credentials: Vec::new(),
            });
        };

        let kdf = blob.kdf_params()?;
        let key = derive_master_key(secret, &blob.salt, &kdf)?.derive_vault_key()?;

        let aad = blob::associated_data(&self.user_id, blob.version);
        let plaintext = Zeroizing::new(decrypt(&key, &blob.sealed(), &aad)?);
        let credentials = blob::decode_payload(&plaintext)?;

        Ok(OpenVault {
            key,
            salt: blob.salt,
            kdf,
            credentials,
        })
    }
}

impl Drop for VaultSession {
    fn drop(&mut self) {
        self.lock();
    }
}

impl std::fmt::Debug for VaultSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSession")
            .field("user_id", &self.user_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn unlocked<'a>(state: &'a mut MutexGuard<'_, State>) -> Result<&'a mut OpenVault> {
    match &mut **state {
        State::Unlocked(open) => Ok(open),
        State::Locked | State::Unlocking => Err(VaultError::NotUnlocked),
    }
}

/// Serialize the whole collection and seal it into a fresh blob.
fn seal(
    key: &VaultKey,
    user_id: &str,
    salt: &[u8],
    kdf: KdfParams,
    credentials: &[Credential],
) -> Result<VaultBlob> {
    let plaintext = Zeroizing::new(blob::encode_payload(credentials)?);
    let aad = blob::associated_data(user_id, CURRENT_VERSION);
    let sealed = encrypt(key, &plaintext, &aad)?;
    Ok(VaultBlob::new(kdf, salt, sealed))
}
