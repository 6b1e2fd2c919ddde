//! Restore system
//!
//! Replaces a user's live rows with the contents of their latest completed
//! backup, atomically: either every registered table is replaced or none is.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub mod transaction;

pub use transaction::{RestoreChange, RestoreTransaction};

use crate::artifact::{ArtifactHandle, ArtifactStore};
use crate::catalog::BackupCatalog;
use crate::codec;
use crate::document::{Row, SnapshotDocument, Value};
use crate::error::{BackupError, RestoreStep, Result};
use crate::tables::{TableSpec, TABLE_REGISTRY};
use crate::user::UserId;

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Idle,
    Loading,
    Replacing,
    Committed,
    RolledBack,
}

impl fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RestorePhase::Idle => "idle",
            RestorePhase::Loading => "loading",
            RestorePhase::Replacing => "replacing",
            RestorePhase::Committed => "committed",
            RestorePhase::RolledBack => "rolled back",
        };
        f.write_str(s)
    }
}

/// Rows touched in one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    pub deleted: usize,
    pub inserted: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub user_id: String,
    pub artifact: String,
    pub tables: BTreeMap<String, TableOutcome>,
    #[serde(skip)]
    pub duration: Duration,
}

impl RestoreReport {
    pub fn rows_restored(&self) -> usize {
        self.tables.values().map(|t| t.inserted).sum()
    }

    pub fn rows_removed(&self) -> usize {
        self.tables.values().map(|t| t.deleted).sum()
    }
}

/// Called after each table is replaced with (tables done, tables total).
pub type ProgressFn<'a> = dyn FnMut(usize, usize) + 'a;

pub struct RestoreOrchestrator {
    tables: &'static [TableSpec],
    phase: RestorePhase,
}

impl Default for RestoreOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl RestoreOrchestrator {
    pub fn new() -> Self {
        Self {
            tables: TABLE_REGISTRY,
            phase: RestorePhase::Idle,
        }
    }

    /// Restore over an explicit table list instead of the global registry.
    pub fn with_tables(tables: &'static [TableSpec]) -> Self {
        Self {
            tables,
            phase: RestorePhase::Idle,
        }
    }

    pub fn phase(&self) -> RestorePhase {
        self.phase
    }

    /// Restore `user` from their most recent completed backup.
    pub fn restore(
        &mut self,
        conn: &mut Connection,
        user: &UserId,
        catalog: &BackupCatalog,
        store: &ArtifactStore,
        progress: &mut ProgressFn<'_>,
    ) -> Result<RestoreReport> {
        let start = Instant::now();
        self.phase = RestorePhase::Loading;

        info!("Starting restore for user {}", user);

        // Stage 1: Locate
        info!("Stage 1/4: Locating latest backup");
        let handle = catalog.latest_handle(conn, user).map_err(|e| {
            self.phase = RestorePhase::Idle;
            if e.is_no_backup() {
                e
            } else {
                BackupError::restore_failed(RestoreStep::LoadingArtifact, e)
            }
        })?;

        // Stage 2: Load
        info!("Stage 2/4: Loading artifact {}", handle);
        let document = self
            .load(store, &handle, user)
            .inspect_err(|_| self.phase = RestorePhase::RolledBack)?;

        // Stage 3: Validate
        info!("Stage 3/4: Validating snapshot");
        self.validate(&document, user)
            .inspect_err(|_| self.phase = RestorePhase::RolledBack)?;

        // Stage 4: Replace
        info!("Stage 4/4: Replacing rows in {} table(s)", self.tables.len());
        self.phase = RestorePhase::Replacing;
        let tables = match self.replace(conn, &document, user, progress) {
            Ok(tables) => tables,
            Err(e) => {
                warn!("Restore failed: {}", e);
                self.phase = RestorePhase::RolledBack;
                return Err(e);
            }
        };
        self.phase = RestorePhase::Committed;

        let report = RestoreReport {
            user_id: user.to_string(),
            artifact: handle.to_string(),
            tables,
            duration: start.elapsed(),
        };

        info!(
            "Restore complete: removed={}, restored={}, duration={:?}",
            report.rows_removed(),
            report.rows_restored(),
            report.duration
        );
        Ok(report)
    }

    fn load(
        &self,
        store: &ArtifactStore,
        handle: &ArtifactHandle,
        user: &UserId,
    ) -> Result<SnapshotDocument> {
        let (manifest, document) = store
            .read_with_manifest(handle)
            .map_err(|e| BackupError::restore_failed(RestoreStep::LoadingArtifact, e))?;

        if &manifest.user_id != user {
            return Err(BackupError::restore_failed(
                RestoreStep::LoadingArtifact,
                BackupError::artifact_corrupt(
                    handle.to_string(),
                    format!("snapshot belongs to {}", manifest.user_id),
                ),
            ));
        }

        Ok(document)
    }

    /// Reject snapshot content that does not fit the registered tables.
    fn validate(&self, document: &SnapshotDocument, user: &UserId) -> Result<()> {
        for name in document.table_names() {
            if !self.tables.iter().any(|t| t.name == name) {
                return Err(BackupError::restore_failed(
                    RestoreStep::Validating {
                        table: name.to_string(),
                    },
                    format!("table `{}` is not registered", name),
                ));
            }
        }

        for table in self.tables {
            let rows = document.table(table.name).unwrap_or_default();
            for row in rows {
                validate_row(table, row, user).map_err(|e| {
                    BackupError::restore_failed(
                        RestoreStep::Validating {
                            table: table.name.to_string(),
                        },
                        e,
                    )
                })?;
            }
        }

        Ok(())
    }

    fn replace(
        &self,
        conn: &mut Connection,
        document: &SnapshotDocument,
        user: &UserId,
        progress: &mut ProgressFn<'_>,
    ) -> Result<BTreeMap<String, TableOutcome>> {
        let mut tx = RestoreTransaction::begin(conn)
            .map_err(|e| BackupError::restore_failed(RestoreStep::BeginTransaction, e))?;

        let mut outcomes = BTreeMap::new();
        let total = self.tables.len();

        for (done, table) in self.tables.iter().enumerate() {
            let outcome = match replace_table(&mut tx, table, document, user) {
                Ok(outcome) => outcome,
                Err(e) => {
                    rollback(tx);
                    return Err(e);
                }
            };
            debug!(
                "Replaced {}: deleted={}, inserted={}",
                table.name, outcome.deleted, outcome.inserted
            );
            outcomes.insert(table.name.to_string(), outcome);
            progress(done + 1, total);
        }

        // Deferred foreign keys are checked here
        tx.commit()
            .map_err(|e| BackupError::restore_failed(RestoreStep::Committing, e))?;

        Ok(outcomes)
    }
}

fn replace_table(
    tx: &mut RestoreTransaction<'_>,
    table: &TableSpec,
    document: &SnapshotDocument,
    user: &UserId,
) -> Result<TableOutcome> {
    let rows = match document.table(table.name) {
        Some(rows) => rows,
        None => {
            warn!("Snapshot has no entry for {}; clearing it", table.name);
            &[]
        }
    };

    let deleted = tx.clear_table(table, user).map_err(|e| {
        BackupError::restore_failed(
            RestoreStep::Deleting {
                table: table.name.to_string(),
            },
            e,
        )
    })?;

    let inserted = if rows.is_empty() {
        0
    } else {
        tx.insert_rows(table, rows).map_err(|e| {
            BackupError::restore_failed(
                RestoreStep::Inserting {
                    table: table.name.to_string(),
                },
                e,
            )
        })?
    };

    Ok(TableOutcome { deleted, inserted })
}

fn rollback(tx: RestoreTransaction<'_>) {
    if let Err(e) = tx.rollback() {
        // The connection rolls back on drop regardless
        warn!("Explicit rollback failed: {}", e);
    }
}

fn validate_row(table: &TableSpec, row: &Row, user: &UserId) -> Result<()> {
    for (column, value) in row {
        let Some(spec) = table.column(column) else {
            return Err(BackupError::ColumnMismatch {
                table: table.name.to_string(),
                column: column.clone(),
            });
        };

        if !codec::accepts(spec.kind, value) {
            return Err(BackupError::ValueMismatch {
                table: table.name.to_string(),
                column: column.clone(),
                expected: spec.kind,
                found: value.type_name(),
            });
        }
    }

    match row.get(table.user_column) {
        Some(Value::Text(owner)) if owner == user.as_str() => Ok(()),
        other => Err(BackupError::ForeignRow {
            table: table.name.to_string(),
            expected: user.to_string(),
            found: match other {
                Some(Value::Text(owner)) => owner.clone(),
                Some(value) => format!("<{}>", value.type_name()),
                None => "<missing>".to_string(),
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::row;
    use crate::tables::table_spec;

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    #[test]
    fn test_validate_row_accepts_owned_row() {
        let goals = table_spec("goals").unwrap();
        let r = row([
            ("id", Value::Integer(1)),
            ("user_id", Value::from("u1")),
            ("progress", Value::Integer(1)),
            ("completed", Value::Bool(true)),
            ("due_date", Value::Null),
        ]);
        validate_row(goals, &r, &user()).unwrap();
    }

    #[test]
    fn test_validate_row_rejects_unknown_column() {
        let goals = table_spec("goals").unwrap();
        let r = row([
            ("user_id", Value::from("u1")),
            ("title; DROP TABLE goals", Value::from("x")),
        ]);
        assert!(matches!(
            validate_row(goals, &r, &user()),
            Err(BackupError::ColumnMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_row_rejects_foreign_owner() {
        let messages = table_spec("messages").unwrap();
        let r = row([("sender_id", Value::from("u2")), ("body", Value::from("x"))]);
        match validate_row(messages, &r, &user()) {
            Err(BackupError::ForeignRow { found, .. }) => assert_eq!(found, "u2"),
            other => panic!("expected ForeignRow, got {:?}", other),
        }

        let r = row([("body", Value::from("x"))]);
        assert!(matches!(
            validate_row(messages, &r, &user()),
            Err(BackupError::ForeignRow { .. })
        ));
    }

    #[test]
    fn test_validate_row_rejects_wrong_type() {
        let goals = table_spec("goals").unwrap();
        let r = row([("user_id", Value::from("u1")), ("completed", Value::from("yes"))]);
        assert!(matches!(
            validate_row(goals, &r, &user()),
            Err(BackupError::ValueMismatch { .. })
        ));
    }

    #[test]
    fn test_report_totals() {
        let mut tables = BTreeMap::new();
        tables.insert("goals".to_string(), TableOutcome { deleted: 2, inserted: 3 });
        tables.insert("notes".to_string(), TableOutcome { deleted: 1, inserted: 0 });
        let report = RestoreReport {
            user_id: "u1".to_string(),
            artifact: "u1/backup-u1-x.tar.gz".to_string(),
            tables,
            duration: Duration::ZERO,
        };
        assert_eq!(report.rows_restored(), 3);
        assert_eq!(report.rows_removed(), 3);
    }

    #[test]
    fn test_phase_starts_idle() {
        assert_eq!(RestoreOrchestrator::new().phase(), RestorePhase::Idle);
        assert_eq!(RestorePhase::RolledBack.to_string(), "rolled back");
    }
}
