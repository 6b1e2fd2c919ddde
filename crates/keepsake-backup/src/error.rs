//! Error taxonomy for backup and restore operations.

use std::fmt;
use thiserror::Error;

use crate::status::OperationKind;
use crate::tables::ColumnKind;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, BackupError>;

/// Boxed underlying cause carried by composite errors
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the backup engine.
///
/// `NoBackupAvailable` needs no user action; `RestoreFailed` may be retried.
#[derive(Error, Debug)]
pub enum BackupError {
    /// A table read failed while building a snapshot
    #[error("Snapshot collection failed on table `{table}`: {source}")]
    CollectionFailed {
        table: String,
        #[source]
        source: Cause,
    },

    /// The artifact could not be persisted
    #[error("Failed to write backup artifact {path}: {source}")]
    ArtifactWriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The artifact handle does not resolve
    #[error("Backup artifact not found: {handle}")]
    ArtifactNotFound { handle: String },

    /// The artifact exists but cannot be decoded or fails integrity checks
    #[error("Backup artifact {handle} is corrupt: {reason}")]
    ArtifactCorrupt { handle: String, reason: String },

    /// Restore requested for a user with no completed backup
    #[error("No completed backup available for user {user}")]
    NoBackupAvailable { user: String },

    /// Restore was attempted and rolled back
    #[error("Restore failed while {step}: {source}")]
    RestoreFailed {
        step: RestoreStep,
        #[source]
        source: Cause,
    },

    /// A snapshot row names a column the table does not register
    #[error("Column `{column}` is not registered for table `{table}`")]
    ColumnMismatch { table: String, column: String },

    /// A snapshot row is owned by a different user
    #[error("Row in table `{table}` belongs to {found}, expected {expected}")]
    ForeignRow {
        table: String,
        expected: String,
        found: String,
    },

    /// A snapshot value does not fit its registered column
    #[error("Column `{column}` of table `{table}` expects {expected}, snapshot holds {found}")]
    ValueMismatch {
        table: String,
        column: String,
        expected: ColumnKind,
        found: &'static str,
    },

    /// Listing or deleting artifacts failed
    #[error("Artifact storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Backup catalog or settings query failed
    #[error("Backup registry query failed: {0}")]
    Registry(#[from] rusqlite::Error),

    /// Another operation of the same kind is still running for the user
    #[error("A {kind} is already in progress for user {user}")]
    OperationInProgress { user: String, kind: OperationKind },

    /// User id failed validation
    #[error("Invalid user id {0:?}: expected 1-64 characters of [A-Za-z0-9_-]")]
    InvalidUserId(String),

    /// Artifact handle failed validation
    #[error("Invalid artifact handle: {0}")]
    InvalidHandle(String),

    /// Connection lock or worker thread failure
    #[error("Database unavailable: {0}")]
    Database(String),
}

/// Where in a restore a failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreStep {
    LoadingArtifact,
    BeginTransaction,
    Validating { table: String },
    Deleting { table: String },
    Inserting { table: String },
    Committing,
}

impl fmt::Display for RestoreStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreStep::LoadingArtifact => write!(f, "loading the backup artifact"),
            RestoreStep::BeginTransaction => write!(f, "opening the restore transaction"),
            RestoreStep::Validating { table } => write!(f, "validating rows for `{}`", table),
            RestoreStep::Deleting { table } => write!(f, "clearing rows from `{}`", table),
            RestoreStep::Inserting { table } => write!(f, "inserting rows into `{}`", table),
            RestoreStep::Committing => write!(f, "committing"),
        }
    }
}

impl BackupError {
    /// Wrap a table read failure
    pub fn collection_failed(table: impl Into<String>, source: impl Into<Cause>) -> Self {
        Self::CollectionFailed {
            table: table.into(),
            source: source.into(),
        }
    }

    /// Create an artifact corrupt error
    pub fn artifact_corrupt(handle: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ArtifactCorrupt {
            handle: handle.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a failure during restore
    pub fn restore_failed(step: RestoreStep, source: impl Into<Cause>) -> Self {
        Self::RestoreFailed {
            step,
            source: source.into(),
        }
    }

    /// Whether this is the "nothing to restore" outcome
    pub fn is_no_backup(&self) -> bool {
        matches!(self, Self::NoBackupAvailable { .. })
    }

    /// The failing restore step, if this is a restore failure
    pub fn restore_step(&self) -> Option<&RestoreStep> {
        match self {
            Self::RestoreFailed { step, .. } => Some(step),
            _ => None,
        }
    }
}
