//! Snapshot collection: read every registered table for one user.

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info};

use crate::codec;
use crate::document::{Row, SnapshotDocument};
use crate::error::{BackupError, Result};
use crate::tables::{TableSpec, TABLE_REGISTRY};
use crate::user::UserId;

/// Reads a user's rows from the registered tables.
pub struct SnapshotCollector {
    tables: &'static [TableSpec],
}

impl Default for SnapshotCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCollector {
    pub fn new() -> Self {
        Self {
            tables: TABLE_REGISTRY,
        }
    }

    /// Collect over an explicit table list instead of the global registry.
    pub fn with_tables(tables: &'static [TableSpec]) -> Self {
        Self { tables }
    }

    /// Build the snapshot document for `user`.
    ///
    /// All reads share one deferred transaction so the document is a single
    /// consistent view. Any failed read abandons the whole collection.
    pub fn collect(&self, conn: &mut Connection, user: &UserId) -> Result<SnapshotDocument> {
        info!("Collecting snapshot for user {}", user);

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(|e| BackupError::collection_failed("<transaction>", e))?;

        let mut document = SnapshotDocument::new();
        for table in self.tables {
            let rows = read_table(&tx, table, user)?;
            debug!("Read {} row(s) from {}", rows.len(), table.name);
            document.insert_table(table.name, rows);
        }

        // Read-only: nothing to keep
        tx.rollback()
            .map_err(|e| BackupError::collection_failed("<transaction>", e))?;

        info!(
            "Snapshot collected: {} table(s), {} row(s)",
            self.tables.len(),
            document.total_rows()
        );
        Ok(document)
    }
}

fn read_table(conn: &Connection, table: &TableSpec, user: &UserId) -> Result<Vec<Row>> {
    let columns = table
        .column_names()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {} FROM \"{}\" WHERE \"{}\" = ?1",
        columns, table.name, table.user_column
    );

    let fail = |e: rusqlite::Error| BackupError::collection_failed(table.name, e);

    let mut stmt = conn.prepare(&sql).map_err(fail)?;
    let mut cursor = stmt.query([user.as_str()]).map_err(fail)?;

    let mut rows = Vec::new();
    while let Some(raw) = cursor.next().map_err(fail)? {
        let mut row = Row::new();
        for (index, column) in table.columns.iter().enumerate() {
            let value = raw.get_ref(index).map_err(fail)?;
            let value = codec::decode(column, value)
                .map_err(|reason| BackupError::collection_failed(table.name, reason))?;
            row.insert(column.name.to_string(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Value;
    use crate::schema;
    use crate::tables::{ColumnKind, ColumnSpec};

    fn conn_with_tables() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::init_feature_tables(&conn).unwrap();
        conn
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn test_collect_includes_every_table() {
        let mut conn = conn_with_tables();
        let doc = SnapshotCollector::new()
            .collect(&mut conn, &user("u1"))
            .unwrap();

        for table in TABLE_REGISTRY {
            assert_eq!(doc.table(table.name), Some(&[][..]), "{}", table.name);
        }
    }

    #[test]
    fn test_collect_scopes_by_user_column() {
        let mut conn = conn_with_tables();
        conn.execute_batch(
            "INSERT INTO goals (id, user_id, title, completed, created_at) \
                 VALUES (1, 'u1', 'A', 1, '2024-01-01T00:00:00Z');
             INSERT INTO goals (id, user_id, title, created_at) \
                 VALUES (2, 'u2', 'B', '2024-01-01T00:00:00Z');
             INSERT INTO messages (id, sender_id, recipient_id, body) VALUES (1, 'u2', 'u1', 'hi');",
        )
        .unwrap();

        let doc = SnapshotCollector::new()
            .collect(&mut conn, &user("u1"))
            .unwrap();

        let goals = doc.table("goals").unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0]["title"], Value::Text("A".to_string()));
        assert_eq!(goals[0]["completed"], Value::Bool(true));
        assert_eq!(goals[0]["progress"], Value::Real(0.0));
        assert_eq!(goals[0]["description"], Value::Null);
        assert!(matches!(goals[0]["created_at"], Value::Timestamp(_)));

        // Received messages belong to the sender
        assert!(doc.table("messages").unwrap().is_empty());
    }

    #[test]
    fn test_missing_table_fails_collection() {
        let mut conn = Connection::open_in_memory().unwrap();
        let err = SnapshotCollector::new()
            .collect(&mut conn, &user("u1"))
            .unwrap_err();

        match err {
            BackupError::CollectionFailed { table, .. } => assert_eq!(table, "profiles"),
            other => panic!("expected CollectionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_undecodable_value_fails_collection() {
        static TABLES: &[TableSpec] = &[TableSpec {
            name: "goals",
            user_column: "user_id",
            columns: &[
                ColumnSpec {
                    name: "user_id",
                    kind: ColumnKind::Text,
                },
                ColumnSpec {
                    name: "title",
                    kind: ColumnKind::Timestamp,
                },
            ],
        }];

        let mut conn = conn_with_tables();
        conn.execute(
            "INSERT INTO goals (id, user_id, title) VALUES (1, 'u1', 'not a date')",
            [],
        )
        .unwrap();

        let err = SnapshotCollector::with_tables(TABLES)
            .collect(&mut conn, &user("u1"))
            .unwrap_err();
        assert!(matches!(err, BackupError::CollectionFailed { ref table, .. } if table == "goals"));
    }
}
