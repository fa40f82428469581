//! Credential, CredentialUpdate and User types.
//!
//! A `Credential` only ever exists in plaintext inside an unlocked
//! session; at rest the whole collection is sealed into one blob.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroize;

/// A single stored login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Random v4 identifier, unique within a vault.
    pub id: Uuid,

    /// The site or service this login belongs to (e.g. "example.com").
    pub website: String,

    pub username: String,

    /// The stored password or token.
    pub secret: String,

    pub created_at: DateTime<Utc>,

    /// Strictly increases on every mutation of this record.
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub(crate) fn new(id: Uuid, website: String, username: String, secret: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            website,
            username,
            secret,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge `fields` into this record and advance `updated_at`.
    pub(crate) fn apply(&mut self, fields: CredentialUpdate) {
        if let Some(website) = fields.website {
            self.website = website;
        }
        if let Some(username) = fields.username {
            self.username = username;
        }
        if let Some(mut secret) = fields.secret {
            std::mem::swap(&mut self.secret, &mut secret);
            secret.zeroize();
        }
        self.updated_at = next_timestamp(self.updated_at);
    }
}

// Every copy wipes its secret when it goes away, including the clones
// made while persisting and the ones handed to callers.
impl Drop for Credential {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

// Keep the secret out of logs and panic messages.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("website", &self.website)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Fields to merge into an existing credential.  `None` leaves the
/// field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub website: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
}

impl CredentialUpdate {
    pub fn website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

/// Identity of the person owning a vault.  Carries no secret material;
/// the UI layer owns it and only passes `id` into the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The current time, or one microsecond past `previous` if the clock
/// has not moved beyond it.
pub(crate) fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
