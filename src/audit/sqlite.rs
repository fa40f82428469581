//! SQLite storage for the audit trail, at `<store_dir>/audit.db`.
//!
//! Writing never fails the vault operation being recorded: if the
//! database can't be opened or written, the vault carries on without it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::AuditOp;
use crate::errors::{Result, VaultError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS audit_log (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp     TEXT NOT NULL,
        operation     TEXT NOT NULL,
        user_id       TEXT NOT NULL,
        credential_id TEXT,
        details       TEXT
    );
    CREATE INDEX IF NOT EXISTS audit_log_user ON audit_log (user_id, id);
";

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: AuditOp,
    pub user_id: String,
    pub credential_id: Option<Uuid>,
    pub details: Option<String>,
}

/// Append-only operation history shared by every user of one store.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) `<dir>/audit.db` with owner-only permissions.
    ///
    /// `None` means audit logging is unavailable.
    pub fn open(dir: &Path) -> Option<Self> {
        let db_path = Self::db_path(dir);
        let conn = match Connection::open(&db_path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(path = %db_path.display(), error = %e, "cannot open audit db");
                return None;
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        conn.execute_batch(SCHEMA).ok()?;
        Some(Self { conn })
    }

    pub fn db_path(dir: &Path) -> PathBuf {
        dir.join("audit.db")
    }

    /// Append `op` for `user_id`.  Write errors are logged and dropped.
    pub fn log(
        &self,
        op: AuditOp,
        user_id: &str,
        credential_id: Option<Uuid>,
        details: Option<&str>,
    ) {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let credential_id = credential_id.map(|id| id.to_string());

        if let Err(e) = self.conn.execute(
            "INSERT INTO audit_log (timestamp, operation, user_id, credential_id, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![now, op.as_str(), user_id, credential_id, details],
        ) {
            tracing::debug!(error = %e, %op, user_id, "audit write skipped");
        }
    }

    /// Most recent entries across all users, newest first.
    ///
    /// `since` keeps only entries recorded at or after that instant.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        self.select(None, limit, since)
    }

    /// Most recent entries for one user, newest first.
    pub fn query_user(
        &self,
        user_id: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuditEntry>> {
        self.select(Some(user_id), limit, since)
    }

    fn select(
        &self,
        user_id: Option<&str>,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuditEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let since = since.map(|ts| ts.to_rfc3339_opts(SecondsFormat::Micros, true));

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, operation, user_id, credential_id, details
                 FROM audit_log
                 WHERE (?1 IS NULL OR user_id = ?1)
                   AND (?2 IS NULL OR timestamp >= ?2)
                 ORDER BY id DESC
                 LIMIT ?3",
            )
            .map_err(|e| VaultError::AuditError(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(params![user_id, since, limit], entry_from_row)
            .map_err(|e| VaultError::AuditError(format!("query exec: {e}")))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| VaultError::AuditError(format!("row parse: {e}")))
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let timestamp: String = row.get(1)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    let operation: String = row.get(2)?;
    let operation = operation
        .parse::<AuditOp>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    let credential_id = row
        .get::<_, Option<String>>(4)?
        .map(|id| Uuid::parse_str(&id))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(AuditEntry {
        id: row.get(0)?,
        timestamp,
        operation,
        user_id: row.get(3)?,
        credential_id,
        details: row.get(5)?,
    })
}
