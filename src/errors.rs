use thiserror::Error;
use uuid::Uuid;

/// All errors that can occur in credvault.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Wrong master secret, tampered ciphertext, or a blob moved under
    /// another user id. These cases are deliberately indistinguishable.
    #[error("Authentication failed: wrong master secret or corrupted vault")]
    Authentication,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Vault errors ---
    #[error("Malformed vault blob: {0}")]
    MalformedBlob(String),

    #[error("Credential {0} not found")]
    NotFound(Uuid),

    #[error("Vault is locked; unlock it before accessing credentials")]
    NotUnlocked,

    #[error("Vault for user '{0}' is already unlocked")]
    AlreadyUnlocked(String),

    // --- Storage errors ---
    #[error("Failed to persist vault: {0}")]
    Persist(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- Audit errors ---
    #[error("Audit error: {0}")]
    AuditError(String),
}

/// Convenience type alias for credvault results.
pub type Result<T> = std::result::Result<T, VaultError>;
