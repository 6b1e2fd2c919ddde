//! Registry of backup-eligible tables.
//!
//! The set is closed and fixed at compile time. Order matters: restore
//! clears and refills tables in this order, so parents come before
//! children that reference them.

use std::fmt;

/// Storage class of a registered column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    /// Stored as INTEGER 0/1
    Boolean,
    /// Stored as RFC 3339 TEXT, UTC
    Timestamp,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Real => "real",
            ColumnKind::Text => "text",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// A registered column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

/// A registered table and the column that scopes its rows to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub user_column: &'static str,
    pub columns: &'static [ColumnSpec],
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec { name, kind }
}

use ColumnKind::{Boolean, Integer, Real, Text, Timestamp};

/// Every table that makes up a user's backup-eligible state, in restore order.
pub const TABLE_REGISTRY: &[TableSpec] = &[
    TableSpec {
        name: "profiles",
        user_column: "user_id",
        columns: &[
            col("user_id", Text),
            col("display_name", Text),
            col("bio", Text),
            col("avatar_url", Text),
            col("updated_at", Timestamp),
        ],
    },
    TableSpec {
        name: "goals",
        user_column: "user_id",
        columns: &[
            col("id", Integer),
            col("user_id", Text),
            col("title", Text),
            col("description", Text),
            col("progress", Real),
            col("completed", Boolean),
            col("due_date", Timestamp),
            col("created_at", Timestamp),
        ],
    },
    TableSpec {
        name: "notes",
        user_column: "user_id",
        columns: &[
            col("id", Integer),
            col("user_id", Text),
            col("goal_id", Integer),
            col("body", Text),
            col("created_at", Timestamp),
        ],
    },
    TableSpec {
        name: "friendships",
        user_column: "user_id",
        columns: &[
            col("user_id", Text),
            col("friend_id", Text),
            col("status", Text),
            col("created_at", Timestamp),
        ],
    },
    TableSpec {
        name: "notifications",
        user_column: "user_id",
        columns: &[
            col("id", Integer),
            col("user_id", Text),
            col("kind", Text),
            col("message", Text),
            col("is_read", Boolean),
            col("created_at", Timestamp),
        ],
    },
    TableSpec {
        name: "messages",
        user_column: "sender_id",
        columns: &[
            col("id", Integer),
            col("sender_id", Text),
            col("recipient_id", Text),
            col("body", Text),
            col("sent_at", Timestamp),
        ],
    },
];

/// Look up a registered table by name
pub fn table_spec(name: &str) -> Option<&'static TableSpec> {
    TABLE_REGISTRY.iter().find(|t| t.name == name)
}
