//! Conversion between SQLite storage values and snapshot values, driven by
//! the registered column kinds.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

use crate::document::Value;
use crate::tables::{ColumnKind, ColumnSpec};

/// Decode one stored value according to its column's registered kind.
pub fn decode(column: &ColumnSpec, raw: ValueRef<'_>) -> Result<Value, String> {
    let value = match (column.kind, raw) {
        (_, ValueRef::Null) => Value::Null,
        (ColumnKind::Integer, ValueRef::Integer(n)) => Value::Integer(n),
        (ColumnKind::Real, ValueRef::Real(n)) if n.is_finite() => Value::Real(n),
        (ColumnKind::Real, ValueRef::Real(n)) => {
            return Err(format!(
                "column `{}` holds {}, which a snapshot cannot represent",
                column.name, n
            ))
        }
        (ColumnKind::Real, ValueRef::Integer(n)) => Value::Real(n as f64),
        (ColumnKind::Boolean, ValueRef::Integer(n)) => Value::Bool(n != 0),
        (ColumnKind::Text, ValueRef::Text(bytes)) => Value::Text(utf8(column, bytes)?.to_string()),
        (ColumnKind::Timestamp, ValueRef::Text(bytes)) => {
            let text = utf8(column, bytes)?;
            let ts = DateTime::parse_from_rfc3339(text).map_err(|e| {
                format!("column `{}` holds {:?}, not an RFC 3339 timestamp: {}", column.name, text, e)
            })?;
            Value::Timestamp(ts.with_timezone(&Utc))
        }
        (kind, other) => {
            return Err(format!(
                "column `{}` is registered as {} but the store holds {}",
                column.name,
                kind,
                other.data_type()
            ))
        }
    };
    Ok(value)
}

fn utf8<'a>(column: &ColumnSpec, bytes: &'a [u8]) -> Result<&'a str, String> {
    std::str::from_utf8(bytes).map_err(|e| format!("column `{}` is not valid UTF-8: {}", column.name, e))
}

/// Whether a snapshot value may be written to a column of this kind.
pub fn accepts(kind: ColumnKind, value: &Value) -> bool {
    matches!(
        (kind, value),
        (_, Value::Null)
            | (ColumnKind::Integer, Value::Integer(_))
            | (ColumnKind::Real, Value::Real(_) | Value::Integer(_))
            | (ColumnKind::Boolean, Value::Bool(_))
            | (ColumnKind::Text, Value::Text(_))
            | (ColumnKind::Timestamp, Value::Timestamp(_))
    )
}

/// Canonical stored form of a timestamp
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Integer(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            Value::Real(n) => ToSqlOutput::Owned(SqlValue::Real(*n)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Timestamp(ts) => ToSqlOutput::Owned(SqlValue::Text(format_timestamp(ts))),
        })
    }
}
