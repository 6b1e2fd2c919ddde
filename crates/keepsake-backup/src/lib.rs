//! Keepsake Backup Engine
//!
//! This crate provides per-user backup and restore for the application's
//! relational store. A backup reads every registered table for one user,
//! writes the rows as a gzip-compressed artifact with a SHA256-checked
//! manifest, and records it in the backup registry. A restore replaces the
//! user's live rows with the latest completed backup inside one transaction.
//!
//! # Features
//!
//! - **Closed table registry**: every table and column is known at compile time
//! - **Consistent snapshots**: all tables are read inside one transaction
//! - **Atomic artifacts**: written to a temporary file and renamed into place
//! - **All-or-nothing restore**: any failure rolls back every table
//! - **Progress tracking**: per-user status for backups and restores
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8Path;
//! use keepsake_backup::{ArtifactStore, BackupService, Database, UserId};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Database::open(Utf8Path::new("app.db"))?;
//!     let service = BackupService::new(db, ArtifactStore::new("backups"));
//!     let user = UserId::new("alice")?;
//!
//!     let created = service.create_backup(&user).await?;
//!     println!("Backup created: {} bytes", created.artifact_size);
//!
//!     let report = service.restore(&user).await?;
//!     println!("Restored {} rows", report.rows_restored());
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod catalog;
pub mod codec;
pub mod collector;
pub mod compression;
pub mod db;
pub mod document;
pub mod error;
pub mod manifest;
pub mod restore;
pub mod schema;
pub mod service;
pub mod settings;
pub mod status;
pub mod tables;
pub mod user;

// Re-export commonly used types
pub use artifact::{ArtifactHandle, ArtifactInfo, ArtifactStore, WrittenArtifact};
pub use catalog::{BackupCatalog, BackupEntry, BackupStatus};
pub use collector::SnapshotCollector;
pub use compression::{CompressionStats, DEFAULT_COMPRESSION_LEVEL};
pub use db::Database;
pub use document::{Row, SnapshotDocument, Value};
pub use error::{BackupError, RestoreStep, Result};
pub use manifest::{ArtifactManifest, MANIFEST_FILENAME, MANIFEST_VERSION};
pub use restore::{RestoreOrchestrator, RestorePhase, RestoreReport, TableOutcome};
pub use service::{BackupCreated, BackupService, LastBackup};
pub use settings::{BackupSettings, SettingsView};
pub use status::{OperationGuard, OperationKind, OperationStatus, StatusTracker};
pub use tables::{ColumnKind, ColumnSpec, TableSpec, TABLE_REGISTRY};
pub use user::UserId;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_manifest_constants() {
        assert_eq!(MANIFEST_FILENAME, ".backup-manifest.json");
        assert_eq!(MANIFEST_VERSION, "1.0.0");
    }

    #[test]
    fn test_compression_level() {
        assert_eq!(DEFAULT_COMPRESSION_LEVEL, 6);
    }

    #[test]
    fn test_registry_not_empty() {
        assert!(!TABLE_REGISTRY.is_empty());
        assert!(TABLE_REGISTRY.iter().any(|t| t.name == "goals"));
        assert!(TABLE_REGISTRY.iter().any(|t| t.name == "notes"));
    }
}
