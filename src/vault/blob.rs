//! At-rest vault blob and its JSON encoding.
//!
//! One blob is stored per user under the key `vault:<userId>`:
//!
//! ```text
//! {"version":1,
//!  "kdf":{"memory_kib":65536,"iterations":3,"parallelism":4},
//!  "salt":"<base64>","nonce":"<base64>","ciphertext":"<base64>","tag":"<base64>"}
//! ```
//!
//! - **version**: format version, dispatched on explicitly when decoding.
//! - **kdf**: Argon2id parameters the vault was created with.
//! - **salt**: generated once per vault, never regenerated.
//! - **nonce / ciphertext / tag**: output of the last AES-256-GCM seal.
//!
//! The plaintext inside the ciphertext is `{"credentials":[...]}`.

use serde::{Deserialize, Serialize};

use super::credential::Credential;
use crate::crypto::kdf::{KdfParams, MIN_SALT_LEN};
use crate::crypto::Sealed;
use crate::errors::{Result, VaultError};

/// Current blob format version.
pub const CURRENT_VERSION: u32 = 1;

/// Prefix of every storage key.
const KEY_PREFIX: &str = "vault:";

/// Storage key for a user's blob.
pub fn storage_key(user_id: &str) -> String {
    format!("{KEY_PREFIX}{user_id}")
}

/// Associated data bound into every seal, so a blob only opens under
/// the user id and format version it was written for.
pub(crate) fn associated_data(user_id: &str, version: u32) -> Vec<u8> {
    format!("credvault:v{version}:{}", storage_key(user_id)).into_bytes()
}

// ---------------------------------------------------------------------------
// VaultBlob
// ---------------------------------------------------------------------------

/// Argon2 parameters as they appear in the blob.  Converted into
/// `KdfParams` (which enforces the floors) before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl From<KdfParams> for StoredKdfParams {
    fn from(p: KdfParams) -> Self {
        Self {
            memory_kib: p.memory_kib(),
            iterations: p.iterations(),
            parallelism: p.parallelism(),
        }
    }
}

/// The ciphertext artifact persisted for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultBlob {
    pub version: u32,

    pub kdf: StoredKdfParams,

    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,

    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub nonce: Vec<u8>,

    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub ciphertext: Vec<u8>,

    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub tag: Vec<u8>,
}

/// Only the version field, read first to pick a decoder.
#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl VaultBlob {
    /// Assemble a current-version blob from a seal result.
    pub fn new(kdf: KdfParams, salt: &[u8], sealed: Sealed) -> Self {
        Self {
            version: CURRENT_VERSION,
            kdf: kdf.into(),
            salt: salt.to_vec(),
            nonce: sealed.nonce,
            ciphertext: sealed.ciphertext,
            tag: sealed.tag,
        }
    }

    /// The seal fields, ready for `crypto::decrypt`.
    pub fn sealed(&self) -> Sealed {
        Sealed {
            nonce: self.nonce.clone(),
            ciphertext: self.ciphertext.clone(),
            tag: self.tag.clone(),
        }
    }

    /// Validated KDF parameters.  Values below the floors are treated as
    /// a malformed blob rather than derived with.
    pub fn kdf_params(&self) -> Result<KdfParams> {
        KdfParams::new(
            self.kdf.memory_kib,
            self.kdf.iterations,
            self.kdf.parallelism,
        )
        .map_err(|e| VaultError::MalformedBlob(format!("kdf parameters: {e}")))
    }

    /// Serialize to the stored JSON form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| VaultError::SerializationError(format!("blob: {e}")))
    }

    /// Parse a stored value, dispatching on its version.
    ///
    /// New format versions get their own arm here that upgrades into the
    /// current struct.  Anything unrecognised is rejected outright.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let probe: VersionProbe = serde_json::from_slice(bytes)
            .map_err(|e| VaultError::MalformedBlob(format!("missing or invalid version: {e}")))?;

        let blob = match probe.version {
            CURRENT_VERSION => serde_json::from_slice::<VaultBlob>(bytes)
                .map_err(|e| VaultError::MalformedBlob(format!("v1 blob: {e}")))?,
            other => {
                return Err(VaultError::MalformedBlob(format!(
                    "unsupported version {other}, expected {CURRENT_VERSION}"
                )))
            }
        };

        if blob.salt.len() < MIN_SALT_LEN {
            return Err(VaultError::MalformedBlob(format!(
                "salt is {} bytes, need at least {MIN_SALT_LEN}",
                blob.salt.len()
            )));
        }
        blob.kdf_params()?;

        Ok(blob)
    }
}

// ---------------------------------------------------------------------------
// Plaintext payload
// ---------------------------------------------------------------------------

/// What gets sealed inside a blob.  Written through `PayloadRef` to
/// avoid cloning the collection.
#[derive(Deserialize)]
struct Payload {
    credentials: Vec<Credential>,
}

#[derive(Serialize)]
struct PayloadRef<'a> {
    credentials: &'a [Credential],
}

pub(crate) fn encode_payload(credentials: &[Credential]) -> Result<Vec<u8>> {
    serde_json::to_vec(&PayloadRef { credentials })
        .map_err(|e| VaultError::SerializationError(format!("credentials: {e}")))
}

/// Parse decrypted bytes.  The tag already verified, so a parse failure
/// here means the writer produced a payload this build cannot read.
pub(crate) fn decode_payload(bytes: &[u8]) -> Result<Vec<Credential>> {
    serde_json::from_slice::<Payload>(bytes)
        .map(|p| p.credentials)
        .map_err(|e| VaultError::MalformedBlob(format!("credentials payload: {e}")))
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let encoded = BASE64.encode(data);
    serializer.serialize_str(&encoded)
}

fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}
