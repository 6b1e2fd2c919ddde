//! Backup registry: which artifacts exist for which user, and the outcome
//! of each backup attempt.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::artifact::ArtifactHandle;
use crate::error::{BackupError, Result};
use crate::user::UserId;

/// Outcome of a backup attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Completed,
    Failed,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupStatus::Completed => "completed",
            BackupStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(BackupStatus::Completed),
            "failed" => Some(BackupStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the registry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub id: i64,
    pub user_id: String,
    pub artifact: Option<String>,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub status: BackupStatus,
    pub reason: Option<String>,
}

impl BackupEntry {
    /// The artifact handle, for completed entries.
    pub fn handle(&self) -> Result<Option<ArtifactHandle>> {
        self.artifact.as_deref().map(ArtifactHandle::parse).transpose()
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get("created_at")?;
        let status: String = row.get("status")?;
        let size: i64 = row.get("size_bytes")?;

        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            artifact: row.get("artifact")?,
            size_bytes: size.max(0) as u64,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
            status: BackupStatus::parse(&status).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("unknown backup status {:?}", status).into(),
                )
            })?,
            reason: row.get("reason")?,
        })
    }
}

const SELECT_COLUMNS: &str = "id, user_id, artifact, size_bytes, created_at, status, reason";

/// Stored as millisecond RFC3339 so lexical order is chronological.
fn registry_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Queries over the `backups` table.
///
/// Stateless: every method takes the connection to run against, so the
/// catalog can share a transaction with the caller when needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupCatalog;

impl BackupCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Record a completed backup. Returns the new entry id.
    pub fn record_completed(
        &self,
        conn: &Connection,
        user: &UserId,
        handle: &ArtifactHandle,
        size_bytes: u64,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO backups (user_id, artifact, size_bytes, created_at, status) \
             VALUES (?1, ?2, ?3, ?4, 'completed')",
            params![
                user.as_str(),
                handle.to_string(),
                size_bytes as i64,
                registry_timestamp(created_at)
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Recorded completed backup {} for {}", id, user);
        Ok(id)
    }

    /// Record a failed attempt. Failed entries never carry an artifact.
    pub fn record_failed(&self, conn: &Connection, user: &UserId, reason: &str) -> Result<i64> {
        conn.execute(
            "INSERT INTO backups (user_id, artifact, size_bytes, created_at, status, reason) \
             VALUES (?1, NULL, 0, ?2, 'failed', ?3)",
            params![user.as_str(), registry_timestamp(Utc::now()), reason],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Recorded failed backup {} for {}", id, user);
        Ok(id)
    }

    /// Most recent completed backup for the user.
    pub fn latest_completed(&self, conn: &Connection, user: &UserId) -> Result<Option<BackupEntry>> {
        let sql = format!(
            "SELECT {} FROM backups WHERE user_id = ?1 AND status = 'completed' \
             ORDER BY created_at DESC, id DESC LIMIT 1",
            SELECT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, [user.as_str()], BackupEntry::from_row)
            .optional()?)
    }

    /// Most recent attempt of either outcome.
    pub fn latest_attempt(&self, conn: &Connection, user: &UserId) -> Result<Option<BackupEntry>> {
        let sql = format!(
            "SELECT {} FROM backups WHERE user_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT 1",
            SELECT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, [user.as_str()], BackupEntry::from_row)
            .optional()?)
    }

    /// The user's attempts, newest first.
    pub fn history(&self, conn: &Connection, user: &UserId, limit: usize) -> Result<Vec<BackupEntry>> {
        let sql = format!(
            "SELECT {} FROM backups WHERE user_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![user.as_str(), limit as i64], BackupEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// A single entry, scoped to its owner.
    pub fn get(&self, conn: &Connection, user: &UserId, id: i64) -> Result<Option<BackupEntry>> {
        let sql = format!(
            "SELECT {} FROM backups WHERE user_id = ?1 AND id = ?2",
            SELECT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![user.as_str(), id], BackupEntry::from_row)
            .optional()?)
    }

    /// Drop an entry. Returns the removed entry, if there was one.
    pub fn remove(&self, conn: &Connection, user: &UserId, id: i64) -> Result<Option<BackupEntry>> {
        let Some(entry) = self.get(conn, user, id)? else {
            return Ok(None);
        };
        conn.execute(
            "DELETE FROM backups WHERE user_id = ?1 AND id = ?2",
            params![user.as_str(), id],
        )?;
        debug!("Removed backup entry {} for {}", id, user);
        Ok(Some(entry))
    }

    /// The handle of the latest completed backup, or `NoBackupAvailable`.
    pub fn latest_handle(&self, conn: &Connection, user: &UserId) -> Result<ArtifactHandle> {
        let no_backup = || BackupError::NoBackupAvailable {
            user: user.to_string(),
        };
        let entry = self.latest_completed(conn, user)?.ok_or_else(no_backup)?;
        entry.handle()?.ok_or_else(no_backup)
    }
}
