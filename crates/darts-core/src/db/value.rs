//! Typed column values and the statement renderer used for SQL diagnostics.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::ToSql;

use crate::error::{DartsError, Result};

/// Seconds since the epoch for 9999-12-31T00:00:00Z.
const END_OF_TIME_SECS: i64 = 253_402_214_400;

/// Sentinel `DtLastUpdate` / `DtFinish` value meaning "still active".
pub fn end_of_time() -> DateTime<Utc> {
    DateTime::from_timestamp(END_OF_TIME_SECS, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn is_end_of_time(value: &DateTime<Utc>) -> bool {
    *value == end_of_time()
}

/// Current time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Fixed-width RFC 3339 with milliseconds, so text order equals time order.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DartsError::Type(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Semantic type of a column, from which the DDL type is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Varchar(u32),
    Int,
    Timestamp,
}

impl ColumnType {
    pub fn sql(&self) -> String {
        match self {
            ColumnType::Varchar(length) => format!("VARCHAR({})", length),
            ColumnType::Int => "INTEGER".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }
}

/// A single bound parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Int(i64),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Convert a raw SQLite value into the type the column declares.
    pub fn from_column(column_type: ColumnType, value: Value) -> Result<Self> {
        match (column_type, value) {
            (_, Value::Null) => Ok(SqlValue::Null),
            (ColumnType::Varchar(_), Value::Text(text)) => Ok(SqlValue::Text(text)),
            (ColumnType::Varchar(_), Value::Integer(i)) => Ok(SqlValue::Text(i.to_string())),
            (ColumnType::Int, Value::Integer(i)) => Ok(SqlValue::Int(i)),
            (ColumnType::Timestamp, Value::Text(text)) => {
                Ok(SqlValue::Timestamp(parse_timestamp(&text)?))
            }
            (column_type, other) => Err(DartsError::Type(format!(
                "Cannot read {:?} as {}",
                other.data_type(),
                column_type.sql()
            ))),
        }
    }

    pub fn into_text(self) -> Result<String> {
        match self {
            SqlValue::Text(text) => Ok(text),
            SqlValue::Null => Ok(String::new()),
            other => Err(DartsError::Type(format!("Expected text, got {}", other.render()))),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            SqlValue::Int(i) => Ok(*i),
            other => Err(DartsError::Type(format!("Expected integer, got {}", other.render()))),
        }
    }

    pub fn as_i32(&self) -> Result<i32> {
        let value = self.as_int()?;
        i32::try_from(value)
            .map_err(|_| DartsError::Type(format!("Integer {} out of range", value)))
    }

    pub fn as_timestamp(&self) -> Result<DateTime<Utc>> {
        match self {
            SqlValue::Timestamp(dt) => Ok(*dt),
            SqlValue::Text(text) => parse_timestamp(text),
            other => Err(DartsError::Type(format!("Expected timestamp, got {}", other.render()))),
        }
    }

    /// How this value appears in a logged statement.
    pub fn render(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Text(text) => format!("'{}'", text),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Timestamp(dt) => format!("'{}'", format_timestamp(dt)),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Text(text) => ToSqlOutput::from(text.as_str()),
            SqlValue::Int(i) => ToSqlOutput::from(*i),
            SqlValue::Timestamp(dt) => ToSqlOutput::Owned(Value::Text(format_timestamp(dt))),
        })
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

/// Substitute each `?` placeholder (outside string literals) with the rendered
/// value of the matching parameter.
pub fn render_statement(sql: &str, params: &[SqlValue]) -> String {
    let mut rendered = String::with_capacity(sql.len());
    let mut params = params.iter();
    let mut in_literal = false;

    for c in sql.chars() {
        match c {
            '\'' => {
                in_literal = !in_literal;
                rendered.push(c);
            }
            '?' if !in_literal => match params.next() {
                Some(value) => rendered.push_str(&value.render()),
                None => rendered.push(c),
            },
            _ => rendered.push(c),
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_statement_substitutes_in_order() {
        let ts = parse_timestamp("2020-01-01T10:00:00.000Z").unwrap();
        let rendered = render_statement(
            "UPDATE Dart SET DtLastUpdate = ?, Score = ? WHERE RowId = ?",
            &[SqlValue::from(ts), SqlValue::from(20), SqlValue::from("abc")],
        );
        assert_eq!(
            rendered,
            "UPDATE Dart SET DtLastUpdate = '2020-01-01T10:00:00.000Z', Score = 20 WHERE RowId = 'abc'"
        );
    }

    #[test]
    fn test_render_statement_ignores_placeholders_in_literals() {
        let rendered = render_statement(
            "SELECT * FROM Player WHERE Name = 'Who?' AND RowId = ?",
            &[SqlValue::from("x")],
        );
        assert_eq!(rendered, "SELECT * FROM Player WHERE Name = 'Who?' AND RowId = 'x'");
    }

    #[test]
    fn test_timestamps_sort_as_text() {
        let early = parse_timestamp("2019-05-01T09:00:00Z").unwrap();
        let late = end_of_time();
        assert!(format_timestamp(&early) < format_timestamp(&late));
        assert_eq!(format_timestamp(&late), "9999-12-31T00:00:00.000Z");
    }

    #[test]
    fn test_column_type_ddl() {
        assert_eq!(ColumnType::Varchar(36).sql(), "VARCHAR(36)");
        assert_eq!(ColumnType::Int.sql(), "INTEGER");
        assert_eq!(ColumnType::Timestamp.sql(), "TIMESTAMP");
    }

    #[test]
    fn test_from_column_rejects_mismatched_type() {
        let result = SqlValue::from_column(ColumnType::Int, Value::Text("abc".to_string()));
        assert!(result.is_err());
    }
}
