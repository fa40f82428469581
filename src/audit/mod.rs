//! Audit trail of vault operations.
//!
//! [`AuditOp`] names every operation a session can record and is always
//! available, since sessions also tag their tracing events with it.  The
//! SQLite-backed [`AuditLog`] is behind the `audit-log` feature.
//!
//! Only user ids and credential ids are ever recorded, never websites,
//! usernames or secrets.

use std::fmt;
use std::str::FromStr;

use crate::errors::VaultError;

#[cfg(feature = "audit-log")]
mod sqlite;

#[cfg(feature = "audit-log")]
pub use sqlite::{AuditEntry, AuditLog};

/// An operation on a user's vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditOp {
    Unlock,
    UnlockFailed,
    Create,
    Update,
    Delete,
    Lock,
    RotateSecret,
    Reset,
}

impl AuditOp {
    pub const ALL: [AuditOp; 8] = [
        AuditOp::Unlock,
        AuditOp::UnlockFailed,
        AuditOp::Create,
        AuditOp::Update,
        AuditOp::Delete,
        AuditOp::Lock,
        AuditOp::RotateSecret,
        AuditOp::Reset,
    ];

    /// Name stored in the audit database.
    pub fn as_str(self) -> &'static str {
        match self {
            AuditOp::Unlock => "unlock",
            AuditOp::UnlockFailed => "unlock-failed",
            AuditOp::Create => "create",
            AuditOp::Update => "update",
            AuditOp::Delete => "delete",
            AuditOp::Lock => "lock",
            AuditOp::RotateSecret => "rotate-secret",
            AuditOp::Reset => "reset",
        }
    }

    /// `true` for operations that rewrite or remove the stored blob.
    pub fn writes_blob(self) -> bool {
        !matches!(self, AuditOp::Unlock | AuditOp::UnlockFailed | AuditOp::Lock)
    }
}

impl fmt::Display for AuditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditOp {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| VaultError::AuditError(format!("unknown audit operation '{s}'")))
    }
}
