//! The in-memory snapshot of one user's rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single column value.
///
/// Serialized adjacently tagged (`{"type":"integer","value":1}`) so every
/// value reads back with the same type it was written with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Name of the variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Real(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

/// Column name to value.
pub type Row = BTreeMap<String, Value>;

/// Table name to rows, for exactly one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotDocument {
    tables: BTreeMap<String, Vec<Row>>,
}

impl SnapshotDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rows for a table, replacing any previous entry.
    pub fn insert_table(&mut self, table: impl Into<String>, rows: Vec<Row>) {
        self.tables.insert(table.into(), rows);
    }

    /// Rows for a table, `None` when the table is absent from the document.
    pub fn table(&self, table: &str) -> Option<&[Row]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Per-table row counts
    pub fn row_counts(&self) -> BTreeMap<String, usize> {
        self.tables
            .iter()
            .map(|(name, rows)| (name.clone(), rows.len()))
            .collect()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Equality that ignores row order within each table.
    pub fn same_rows_as(&self, other: &SnapshotDocument) -> bool {
        if self.tables.len() != other.tables.len() {
            return false;
        }

        self.tables.iter().all(|(name, rows)| match other.tables.get(name) {
            Some(other_rows) => sorted_keys(rows) == sorted_keys(other_rows),
            None => false,
        })
    }
}

// Rows hold f64 so they are not Ord; compare their canonical JSON instead.
fn sorted_keys(rows: &[Row]) -> Vec<String> {
    let mut keys: Vec<String> = rows
        .iter()
        .map(|row| serde_json::to_string(row).unwrap_or_default())
        .collect();
    keys.sort();
    keys
}

/// Build a row from `(column, value)` pairs.
pub fn row<I, K, V>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_value_serialization_is_tagged() {
        let json = serde_json::to_string(&Value::Integer(1)).unwrap();
        assert_eq!(json, r#"{"type":"integer","value":1}"#);

        let json = serde_json::to_string(&Value::Null).unwrap();
        assert_eq!(json, r#"{"type":"null"}"#);
    }

    #[test]
    fn test_values_keep_their_types() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let values = vec![
            Value::Null,
            Value::Bool(false),
            Value::Integer(-7),
            Value::Real(1.0),
            Value::Text("1".to_string()),
            Value::Text(ts.to_rfc3339()),
            Value::Timestamp(ts),
        ];

        let json = serde_json::to_string(&values).unwrap();
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_empty_table_is_present() {
        let mut doc = SnapshotDocument::new();
        doc.insert_table("notes", Vec::new());

        assert!(doc.contains_table("notes"));
        assert_eq!(doc.table("notes").unwrap().len(), 0);
        assert!(doc.table("goals").is_none());

        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"notes":[]}"#);
    }

    #[test]
    fn test_same_rows_ignores_order() {
        let a = row([("id", Value::Integer(1)), ("title", "A".into())]);
        let b = row([("id", Value::Integer(2)), ("title", "B".into())]);

        let mut left = SnapshotDocument::new();
        left.insert_table("goals", vec![a.clone(), b.clone()]);
        let mut right = SnapshotDocument::new();
        right.insert_table("goals", vec![b.clone(), a.clone()]);

        assert_ne!(left, right);
        assert!(left.same_rows_as(&right));

        right.insert_table("goals", vec![a.clone(), a]);
        assert!(!left.same_rows_as(&right));
    }

    #[test]
    fn test_counts() {
        let mut doc = SnapshotDocument::new();
        doc.insert_table("goals", vec![row([("id", 1i64)]), row([("id", 2i64)])]);
        doc.insert_table("notes", Vec::new());

        assert_eq!(doc.total_rows(), 2);
        assert_eq!(doc.row_counts().get("goals"), Some(&2));
        assert_eq!(doc.table_names().collect::<Vec<_>>(), vec!["goals", "notes"]);
    }
}
