//! Async entry points for callers outside the engine.
//!
//! Every engine call is synchronous SQLite and filesystem work, so it runs
//! on tokio's blocking pool. The service also owns the status tracker and
//! refuses a second backup (or restore) for a user while one is running.

use chrono::{DateTime, Utc};
use keepsake_core::config::BackupDefaults;
use keepsake_core::KeepsakeConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::artifact::{ArtifactInfo, ArtifactStore};
use crate::catalog::{BackupCatalog, BackupEntry};
use crate::collector::SnapshotCollector;
use crate::db::Database;
use crate::error::{BackupError, Result};
use crate::restore::{RestoreOrchestrator, RestoreReport};
use crate::settings::{self, BackupSettings, SettingsView};
use crate::status::{OperationGuard, OperationKind, OperationStatus, StatusTracker};
use crate::user::UserId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastBackup {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupCreated {
    pub backup_id: i64,
    pub artifact: String,
    pub artifact_size: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BackupService {
    db: Database,
    store: ArtifactStore,
    catalog: BackupCatalog,
    tracker: Arc<StatusTracker>,
    defaults: BackupDefaults,
}

impl BackupService {
    pub fn new(db: Database, store: ArtifactStore) -> Self {
        Self {
            db,
            store,
            catalog: BackupCatalog::new(),
            tracker: Arc::new(StatusTracker::new()),
            defaults: BackupDefaults::default(),
        }
    }

    /// Open the configured database and artifact directory.
    pub fn from_config(config: &KeepsakeConfig) -> Result<Self> {
        let db = Database::open(config.database())?;
        let store = ArtifactStore::new(config.artifact_dir())
            .with_compression_level(config.compression_level());
        Ok(Self::new(db, store).with_defaults(config.defaults()))
    }

    /// Settings reported for users who never saved their own.
    pub fn with_defaults(mut self, defaults: BackupDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    /// Whether the user has a completed backup, and when it was taken.
    pub async fn last_backup(&self, user: &UserId) -> Result<LastBackup> {
        let user = user.clone();
        let latest = self
            .run_blocking(move |svc| {
                svc.db
                    .with_conn(|conn| svc.catalog.latest_completed(conn, &user))
            })
            .await?;

        Ok(LastBackup {
            exists: latest.is_some(),
            created_at: latest.map(|e| e.created_at),
        })
    }

    pub fn backup_status(&self, user: &UserId) -> OperationStatus {
        self.tracker.get(user, OperationKind::Backup)
    }

    pub fn restore_status(&self, user: &UserId) -> OperationStatus {
        self.tracker.get(user, OperationKind::Restore)
    }

    /// Snapshot the user's tables into a new artifact and record it.
    ///
    /// Failures are recorded in the registry before being returned.
    pub async fn create_backup(&self, user: &UserId) -> Result<BackupCreated> {
        let guard = OperationGuard::acquire(&self.tracker, user, OperationKind::Backup)?;

        let owner = user.clone();
        self.run_blocking(move |svc| {
            // Finishes when the work ends, even if the caller went away
            let _guard = guard;
            let created = svc.perform_backup(&owner);
            if let Err(e) = &created {
                let recorded = svc
                    .db
                    .with_conn(|conn| svc.catalog.record_failed(conn, &owner, &e.to_string()));
                if let Err(record_err) = recorded {
                    warn!("Could not record failed backup for {}: {}", owner, record_err);
                }
            }
            created
        })
        .await
    }

    fn perform_backup(&self, user: &UserId) -> Result<BackupCreated> {
        info!("Creating backup for user {}", user);

        // Stage 1: Collect
        info!("Stage 1/3: Collecting snapshot");
        let document = self
            .db
            .with_conn(|conn| SnapshotCollector::new().collect(conn, user))?;
        self.tracker.update(user, OperationKind::Backup, 40);

        // Stage 2: Write
        info!("Stage 2/3: Writing artifact");
        let written = self.store.write(user, &document)?;
        self.tracker.update(user, OperationKind::Backup, 80);

        // Stage 3: Record
        info!("Stage 3/3: Recording backup");
        let recorded = self.db.with_conn(|conn| {
            self.catalog.record_completed(
                conn,
                user,
                &written.handle,
                written.size_bytes,
                written.created_at,
            )
        });
        let backup_id = match recorded {
            Ok(id) => id,
            Err(e) => {
                // An unrecorded artifact can never be restored
                if let Err(cleanup) = self.store.delete(&written.handle) {
                    warn!("Could not remove unrecorded artifact {}: {}", written.handle, cleanup);
                }
                return Err(e);
            }
        };

        info!(
            "Backup {} complete: {} ({} bytes, {}% saved)",
            backup_id,
            written.handle,
            written.size_bytes,
            written.stats.compression_percentage()
        );

        Ok(BackupCreated {
            backup_id,
            artifact: written.handle.to_string(),
            artifact_size: written.size_bytes,
            created_at: written.created_at,
        })
    }

    /// Replace the user's live rows with their latest completed backup.
    pub async fn restore(&self, user: &UserId) -> Result<RestoreReport> {
        let guard = OperationGuard::acquire(&self.tracker, user, OperationKind::Restore)?;

        let owner = user.clone();
        self.run_blocking(move |svc| {
            let _guard = guard;
            svc.tracker.update(&owner, OperationKind::Restore, 10);
            let mut progress = |done: usize, total: usize| {
                let pct = 10 + (90 * done / total.max(1)).min(89);
                svc.tracker
                    .update(&owner, OperationKind::Restore, pct as u8);
            };

            svc.db.with_conn(|conn| {
                RestoreOrchestrator::new().restore(
                    conn,
                    &owner,
                    &svc.catalog,
                    &svc.store,
                    &mut progress,
                )
            })
        })
        .await
    }

    /// The user's backup attempts, newest first.
    pub async fn history(&self, user: &UserId, limit: usize) -> Result<Vec<BackupEntry>> {
        let user = user.clone();
        self.run_blocking(move |svc| {
            svc.db
                .with_conn(|conn| svc.catalog.history(conn, &user, limit))
        })
        .await
    }

    /// Remove a backup: registry entry first, then its artifact.
    ///
    /// Returns the removed entry, or `None` if the user has no such backup.
    pub async fn delete_backup(&self, user: &UserId, id: i64) -> Result<Option<BackupEntry>> {
        let user = user.clone();
        self.run_blocking(move |svc| {
            let Some(entry) = svc
                .db
                .with_conn(|conn| svc.catalog.remove(conn, &user, id))?
            else {
                return Ok(None);
            };

            if let Some(handle) = entry.handle()? {
                match svc.store.delete(&handle) {
                    Ok(()) => {}
                    Err(BackupError::ArtifactNotFound { handle }) => {
                        warn!("Artifact {} was already gone", handle);
                    }
                    Err(e) => return Err(e),
                }
            }

            info!("Deleted backup {} for {}", id, user);
            Ok(Some(entry))
        })
        .await
    }

    pub async fn backup_settings(&self, user: &UserId) -> Result<SettingsView> {
        let user = user.clone();
        self.run_blocking(move |svc| {
            svc.db
                .with_conn(|conn| settings::view(conn, &svc.catalog, &user, svc.defaults))
        })
        .await
    }

    pub async fn update_backup_settings(
        &self,
        user: &UserId,
        new_settings: BackupSettings,
    ) -> Result<SettingsView> {
        let user = user.clone();
        self.run_blocking(move |svc| {
            svc.db.with_conn(|conn| {
                settings::save(conn, &user, &new_settings)?;
                settings::view(conn, &svc.catalog, &user, svc.defaults)
            })
        })
        .await
    }

    /// Artifacts on disk for the user, newest first.
    pub async fn list_artifacts(&self, user: &UserId) -> Result<Vec<ArtifactInfo>> {
        let user = user.clone();
        self.run_blocking(move |svc| svc.store.list(&user)).await
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&BackupService) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let service = self.clone();
        tokio::task::spawn_blocking(move || f(&service))
            .await
            .map_err(|e| BackupError::Database(format!("worker task failed: {}", e)))?
    }
}
