//! DDL for the tables this crate owns, plus reference DDL for the feature
//! tables listed in the table registry.

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Backup catalog and per-user settings. Owned by this crate.
pub const CATALOG_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS backups (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT    NOT NULL,
    artifact    TEXT,
    size_bytes  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT    NOT NULL,
    status      TEXT    NOT NULL CHECK (status IN ('completed', 'failed')),
    reason      TEXT
);
CREATE INDEX IF NOT EXISTS idx_backups_user_created ON backups (user_id, created_at);

CREATE TABLE IF NOT EXISTS backup_settings (
    user_id              TEXT PRIMARY KEY,
    auto_backup_enabled  INTEGER NOT NULL DEFAULT 0,
    backup_interval      TEXT    NOT NULL DEFAULT 'weekly',
    updated_at           TEXT    NOT NULL
);
"#;

/// Feature tables as the application defines them. Other modules own these;
/// the DDL is kept here for `keepsake db init` and tests.
pub const FEATURE_TABLES_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    user_id       TEXT PRIMARY KEY,
    display_name  TEXT NOT NULL,
    bio           TEXT,
    avatar_url    TEXT,
    updated_at    TEXT
);

CREATE TABLE IF NOT EXISTS goals (
    id           INTEGER PRIMARY KEY,
    user_id      TEXT    NOT NULL,
    title        TEXT    NOT NULL,
    description  TEXT,
    progress     REAL    NOT NULL DEFAULT 0,
    completed    INTEGER NOT NULL DEFAULT 0,
    due_date     TEXT,
    created_at   TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_goals_user ON goals (user_id);

CREATE TABLE IF NOT EXISTS notes (
    id          INTEGER PRIMARY KEY,
    user_id     TEXT NOT NULL,
    goal_id     INTEGER REFERENCES goals (id),
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_notes_user ON notes (user_id);

CREATE TABLE IF NOT EXISTS friendships (
    user_id     TEXT NOT NULL,
    friend_id   TEXT NOT NULL,
    status      TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    PRIMARY KEY (user_id, friend_id)
);

CREATE TABLE IF NOT EXISTS notifications (
    id          INTEGER PRIMARY KEY,
    user_id     TEXT    NOT NULL,
    kind        TEXT    NOT NULL,
    message     TEXT    NOT NULL,
    is_read     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications (user_id);

CREATE TABLE IF NOT EXISTS messages (
    id            INTEGER PRIMARY KEY,
    sender_id     TEXT NOT NULL,
    recipient_id  TEXT NOT NULL,
    body          TEXT NOT NULL,
    sent_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages (sender_id);
"#;

/// Create the catalog tables if missing.
pub fn ensure_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(CATALOG_DDL)?;
    Ok(())
}

/// Create the reference feature tables if missing.
pub fn init_feature_tables(conn: &Connection) -> Result<()> {
    info!("Creating feature tables");
    conn.execute_batch(FEATURE_TABLES_DDL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TABLE_REGISTRY;

    #[test]
    fn test_ddl_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_catalog(&conn).unwrap();
        ensure_catalog(&conn).unwrap();
        init_feature_tables(&conn).unwrap();
        init_feature_tables(&conn).unwrap();
    }

    #[test]
    fn test_feature_ddl_matches_registry() {
        let conn = Connection::open_in_memory().unwrap();
        init_feature_tables(&conn).unwrap();

        for table in TABLE_REGISTRY {
            let mut stmt = conn
                .prepare(&format!("PRAGMA table_info(\"{}\")", table.name))
                .unwrap();
            let live: Vec<String> = stmt
                .query_map([], |row| row.get::<_, String>(1))
                .unwrap()
                .collect::<std::result::Result<_, _>>()
                .unwrap();
            let registered: Vec<String> = table.column_names().map(String::from).collect();
            assert_eq!(live, registered, "column drift in {}", table.name);
        }
    }
}
