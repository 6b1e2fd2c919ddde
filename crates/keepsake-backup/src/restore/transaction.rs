//! Restore transaction with atomic rollback

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::document::Row;
use crate::tables::TableSpec;
use crate::user::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreChange {
    TableCleared { table: String, rows: usize },
    RowsInserted { table: String, rows: usize },
}

/// A write transaction over the live tables.
///
/// Foreign keys are checked at commit, so tables can be replaced in registry
/// order even when a later table is referenced by an earlier one. Dropping
/// the transaction without committing rolls everything back.
pub struct RestoreTransaction<'conn> {
    pub id: String,
    tx: Transaction<'conn>,
    changes: Vec<RestoreChange>,
}

impl<'conn> RestoreTransaction<'conn> {
    pub fn begin(conn: &'conn mut Connection) -> rusqlite::Result<Self> {
        let id = Uuid::new_v4().to_string();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.pragma_update(None, "defer_foreign_keys", true)?;

        debug!("Began restore transaction {}", id);
        Ok(Self {
            id,
            tx,
            changes: Vec::new(),
        })
    }

    /// Delete every row the user owns in `table`.
    pub fn clear_table(&mut self, table: &TableSpec, user: &UserId) -> rusqlite::Result<usize> {
        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"{}\" = ?1",
            table.name, table.user_column
        );
        let rows = self.tx.execute(&sql, [user.as_str()])?;

        self.changes.push(RestoreChange::TableCleared {
            table: table.name.to_string(),
            rows,
        });
        Ok(rows)
    }

    /// Insert rows whose columns were already checked against `table`.
    ///
    /// Columns are bound in registry order; columns a row omits fall back to
    /// the table default.
    pub fn insert_rows(&mut self, table: &TableSpec, rows: &[Row]) -> rusqlite::Result<usize> {
        for row in rows {
            let columns: Vec<&str> = table
                .column_names()
                .filter(|name| row.contains_key(*name))
                .collect();
            if columns.is_empty() {
                self.tx
                    .execute(&format!("INSERT INTO \"{}\" DEFAULT VALUES", table.name), [])?;
                continue;
            }

            let sql = format!(
                "INSERT INTO \"{}\" ({}) VALUES ({})",
                table.name,
                columns
                    .iter()
                    .map(|c| format!("\"{}\"", c))
                    .collect::<Vec<_>>()
                    .join(", "),
                (1..=columns.len())
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            let mut stmt = self.tx.prepare_cached(&sql)?;
            let values = columns.iter().filter_map(|c| row.get(*c));
            stmt.execute(rusqlite::params_from_iter(values))?;
        }

        self.changes.push(RestoreChange::RowsInserted {
            table: table.name.to_string(),
            rows: rows.len(),
        });
        Ok(rows.len())
    }

    pub fn commit(self) -> rusqlite::Result<Vec<RestoreChange>> {
        info!(
            "Committing restore transaction {} ({} changes)",
            self.id,
            self.changes.len()
        );
        self.tx.commit()?;
        Ok(self.changes)
    }

    pub fn rollback(self) -> rusqlite::Result<()> {
        warn!(
            "Rolling back restore transaction {} ({} changes discarded)",
            self.id,
            self.changes.len()
        );
        for change in self.changes.iter().rev() {
            debug!("Discarding {:?}", change);
        }
        self.tx.rollback()
    }

    pub fn changes(&self) -> &[RestoreChange] {
        &self.changes
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{row, Value};
    use crate::schema;
    use crate::tables::table_spec;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        schema::init_feature_tables(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO goals (id, user_id, title) VALUES (1, 'u1', 'old');
             INSERT INTO goals (id, user_id, title) VALUES (2, 'u2', 'other');",
        )
        .unwrap();
        conn
    }

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    #[test]
    fn test_commit_applies_changes() {
        let mut conn = conn();
        let goals = table_spec("goals").unwrap();
        let mut tx = RestoreTransaction::begin(&mut conn).unwrap();

        assert_eq!(tx.clear_table(goals, &user()).unwrap(), 1);
        let rows = vec![row([
            ("id", Value::Integer(7)),
            ("user_id", Value::from("u1")),
            ("title", Value::from("new")),
        ])];
        assert_eq!(tx.insert_rows(goals, &rows).unwrap(), 1);
        assert_eq!(tx.change_count(), 2);

        let changes = tx.commit().unwrap();
        assert_eq!(
            changes[0],
            RestoreChange::TableCleared {
                table: "goals".to_string(),
                rows: 1
            }
        );

        assert_eq!(count(&conn, "SELECT COUNT(*) FROM goals WHERE user_id = 'u1'"), 1);
        assert_eq!(count(&conn, "SELECT id FROM goals WHERE user_id = 'u1'"), 7);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM goals WHERE user_id = 'u2'"), 1);
    }

    #[test]
    fn test_rollback_discards_changes() {
        let mut conn = conn();
        let goals = table_spec("goals").unwrap();
        let mut tx = RestoreTransaction::begin(&mut conn).unwrap();
        tx.clear_table(goals, &user()).unwrap();
        tx.rollback().unwrap();

        assert_eq!(count(&conn, "SELECT COUNT(*) FROM goals WHERE user_id = 'u1'"), 1);
    }

    #[test]
    fn test_drop_without_commit_rolls_back() {
        let mut conn = conn();
        let goals = table_spec("goals").unwrap();
        {
            let mut tx = RestoreTransaction::begin(&mut conn).unwrap();
            tx.clear_table(goals, &user()).unwrap();
        }
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM goals WHERE user_id = 'u1'"), 1);
    }

    #[test]
    fn test_foreign_keys_checked_at_commit() {
        let mut conn = conn();
        conn.execute(
            "INSERT INTO notes (id, user_id, goal_id, body) VALUES (1, 'u1', 1, 'n')",
            [],
        )
        .unwrap();
        let goals = table_spec("goals").unwrap();
        let notes = table_spec("notes").unwrap();

        // Parent cleared before its child, then child cleared: fine at commit
        let mut tx = RestoreTransaction::begin(&mut conn).unwrap();
        tx.clear_table(goals, &user()).unwrap();
        tx.clear_table(notes, &user()).unwrap();
        tx.commit().unwrap();

        // Dangling child left behind: rejected at commit
        conn.execute(
            "INSERT INTO goals (id, user_id, title) VALUES (3, 'u1', 'g')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO notes (id, user_id, goal_id, body) VALUES (2, 'u1', 3, 'n')",
            [],
        )
        .unwrap();
        let mut tx = RestoreTransaction::begin(&mut conn).unwrap();
        tx.clear_table(goals, &user()).unwrap();
        assert!(tx.commit().is_err());

        assert_eq!(count(&conn, "SELECT COUNT(*) FROM goals WHERE id = 3"), 1);
    }
}
