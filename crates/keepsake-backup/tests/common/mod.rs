//! Common test utilities for keepsake-backup
//!
//! Provides a service backed by an in-memory database with the reference
//! feature tables, plus helpers for seeding and inspecting rows.

#![allow(dead_code)]

use camino::Utf8PathBuf;
use keepsake_backup::schema;
use keepsake_backup::{
    ArtifactStore, BackupService, Database, OperationKind, SnapshotCollector, SnapshotDocument,
    UserId,
};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

pub fn setup() -> (TempDir, BackupService) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).unwrap();

    let db = Database::open_in_memory().unwrap();
    db.with_conn(|conn| schema::init_feature_tables(conn)).unwrap();

    let service = BackupService::new(db, ArtifactStore::new(root.join("artifacts")));
    (temp_dir, service)
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn exec(service: &BackupService, sql: &str) {
    service
        .database()
        .with_conn(|conn| Ok(conn.execute_batch(sql)?))
        .unwrap();
}

pub fn insert_goal(service: &BackupService, owner: &str, id: i64, title: &str) {
    exec(
        service,
        &format!(
            "INSERT INTO goals (id, user_id, title) VALUES ({}, '{}', '{}')",
            id, owner, title
        ),
    );
}

pub fn insert_note(service: &BackupService, owner: &str, id: i64, goal_id: i64, body: &str) {
    exec(
        service,
        &format!(
            "INSERT INTO notes (id, user_id, goal_id, body) VALUES ({}, '{}', {}, '{}')",
            id, owner, goal_id, body
        ),
    );
}

/// (id, title) for the user's goals, ordered by id.
pub fn goals(service: &BackupService, owner: &str) -> Vec<(i64, String)> {
    service
        .database()
        .with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, title FROM goals WHERE user_id = ?1 ORDER BY id")?;
            let rows = stmt
                .query_map([owner], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .unwrap()
}

pub fn count(service: &BackupService, table: &str, owner: &str) -> i64 {
    let column = if table == "messages" { "sender_id" } else { "user_id" };
    service
        .database()
        .with_conn(|conn| {
            Ok(conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", table, column),
                [owner],
                |row| row.get(0),
            )?)
        })
        .unwrap()
}

/// What a backup taken right now would contain.
pub fn live_snapshot(service: &BackupService, owner: &str) -> SnapshotDocument {
    service
        .database()
        .with_conn(|conn| SnapshotCollector::new().collect(conn, &user(owner)))
        .unwrap()
}

/// Make every insert into `table` fail.
pub fn fail_inserts_into(service: &BackupService, table: &str) {
    exec(
        service,
        &format!(
            "CREATE TRIGGER fail_{table}_insert BEFORE INSERT ON {table} \
             BEGIN SELECT RAISE(ABORT, 'injected failure on {table}'); END;"
        ),
    );
}

/// Hold the connection on another thread for `hold`. Returns once the lock
/// is taken, so the next engine call on `service` blocks behind it.
pub fn hold_database(service: &BackupService, hold: Duration) -> thread::JoinHandle<()> {
    let db = service.database().clone();
    let (locked_tx, locked_rx) = mpsc::channel();
    let holder = thread::spawn(move || {
        db.with_conn(|_| {
            locked_tx.send(()).unwrap();
            thread::sleep(hold);
            Ok(())
        })
        .unwrap();
    });
    locked_rx.recv().unwrap();
    holder
}

/// Poll until the tracker reports `kind` finished for `owner`.
pub async fn wait_until_finished(service: &BackupService, owner: &UserId, kind: OperationKind) {
    for _ in 0..250 {
        if service.tracker().get(owner, kind).completed {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{} for {} never finished", kind, owner);
}
