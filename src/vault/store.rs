//! Durable key-value persistence of vault blobs.
//!
//! `VaultStore` is the seam between the session logic and wherever the
//! bytes actually live.  Two backends ship with the crate:
//!
//! - `FileVaultStore`: one file per user in a directory, written via
//!   temp file + fsync + rename so readers never see a partial blob and
//!   an interrupted write leaves the previous blob intact.
//! - `MemoryVaultStore`: an in-process map, useful for tests and for
//!   embedding the vault behind another persistence layer.
//!
//! There is no merge logic: the last writer for a user id wins.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use uuid::Uuid;

use super::blob::{storage_key, VaultBlob};
use crate::errors::{Result, VaultError};

/// Persistence contract for per-user vault blobs.
pub trait VaultStore: Send + Sync {
    /// Read the blob for `user_id`, or `None` if nothing is stored.
    fn get(&self, user_id: &str) -> Result<Option<VaultBlob>>;

    /// Atomically replace the blob for `user_id`.
    ///
    /// Fails with `VaultError::Persist` and leaves any previous blob
    /// untouched if the write cannot complete.
    fn put(&self, user_id: &str, blob: &VaultBlob) -> Result<()>;

    /// Remove the blob for `user_id`.  Removing a missing blob succeeds.
    fn delete(&self, user_id: &str) -> Result<()>;

    /// Identifies the storage behind this handle.
    ///
    /// Two handles over the same underlying storage must return the same
    /// id; the process-wide unlock registry is keyed on it.  The default
    /// is the address of `self`, which suits stores that do not share
    /// state between values.
    fn store_id(&self) -> String {
        format!("store:{:p}", self)
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// Stores each blob as `<dir>/<base64url(vault:<userId>)>.vault`.
#[derive(Debug, Clone)]
pub struct FileVaultStore {
    dir: PathBuf,
    /// Canonical form of `dir`, so differently spelled paths to one
    /// directory share an id.
    canonical: PathBuf,
}

impl FileVaultStore {
    /// Use `dir` for blob files, creating it if it does not exist.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        // Owner-only access to the vault directory.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
        }

        let canonical = fs::canonicalize(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            canonical,
        })
    }

    /// Directory holding the blob files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the blob file for `user_id`.
    ///
    /// User ids are arbitrary text, so the storage key is base64url
    /// encoded to keep separators and `..` out of the file name.
    pub fn blob_path(&self, user_id: &str) -> PathBuf {
        let name = URL_SAFE_NO_PAD.encode(storage_key(user_id));
        self.dir.join(format!("{name}.vault"))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        // Unique temp name so two writers never share a temp file.  Same
        // directory so the rename stays on one filesystem.
        let tmp_path = self.dir.join(format!(
            ".{}.{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy(),
            Uuid::new_v4().simple()
        ));

        let result = (|| {
            let mut options = OpenOptions::new();
            options.write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }

            let mut file = options.open(&tmp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            drop(file);

            fs::rename(&tmp_path, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
            return result;
        }

        // Persist the rename itself.  Not supported everywhere, so best effort.
        #[cfg(unix)]
        {
            if let Ok(dir) = fs::File::open(&self.dir) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }
}

impl VaultStore for FileVaultStore {
    fn get(&self, user_id: &str) -> Result<Option<VaultBlob>> {
        let path = self.blob_path(user_id);
        match fs::read(&path) {
            Ok(bytes) => VaultBlob::decode(&bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, user_id: &str, blob: &VaultBlob) -> Result<()> {
        let bytes = blob.encode()?;
        let path = self.blob_path(user_id);

        self.write_atomic(&path, &bytes)
            .map_err(|e| VaultError::Persist(format!("{}: {e}", path.display())))?;

        tracing::debug!(user_id, bytes = bytes.len(), "wrote vault blob");
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<()> {
        match fs::remove_file(self.blob_path(user_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::Persist(format!("delete: {e}"))),
        }
    }

    fn store_id(&self) -> String {
        format!("file:{}", self.canonical.display())
    }
}

// ---------------------------------------------------------------------------
// Memory backend
// ---------------------------------------------------------------------------

/// In-process store keyed by `vault:<userId>`.
///
/// Values are kept in encoded form and replaced wholesale under a write
/// lock, so a reader sees either the old blob or the new one.  Clones
/// share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryVaultStore {
    entries: Arc<RwLock<HashMap<String, Arc<[u8]>>>>,
}

impl MemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored bytes for `user_id`, as they would be written to disk.
    pub fn raw(&self, user_id: &str) -> Option<Vec<u8>> {
        self.entries
            .read()
            .ok()?
            .get(&storage_key(user_id))
            .map(|v| v.to_vec())
    }

    /// Overwrite the raw stored bytes for `user_id` without validation.
    pub fn insert_raw(&self, user_id: &str, bytes: Vec<u8>) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| VaultError::Persist("memory store lock poisoned".into()))?
            .insert(storage_key(user_id), bytes.into());
        Ok(())
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VaultStore for MemoryVaultStore {
    fn get(&self, user_id: &str) -> Result<Option<VaultBlob>> {
        let value = self
            .entries
            .read()
            .map_err(|_| VaultError::Persist("memory store lock poisoned".into()))?
            .get(&storage_key(user_id))
            .cloned();

        value.map(|bytes| VaultBlob::decode(&bytes)).transpose()
    }

    fn put(&self, user_id: &str, blob: &VaultBlob) -> Result<()> {
        // Encode outside the lock; the swap itself is a single insert.
        let bytes: Arc<[u8]> = blob.encode()?.into();
        self.entries
            .write()
            .map_err(|_| VaultError::Persist("memory store lock poisoned".into()))?
            .insert(storage_key(user_id), bytes);
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| VaultError::Persist("memory store lock poisoned".into()))?
            .remove(&storage_key(user_id));
        Ok(())
    }

    fn store_id(&self) -> String {
        format!("memory:{:p}", Arc::as_ptr(&self.entries))
    }
}
