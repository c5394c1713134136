use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio_postgres::types::ToSql;

use crate::codec::Table;
use crate::errors::RowError;
use crate::schema::column_types;

/// One cell of a row. Every variant carries its SQL type so a NULL binds
/// against the right column type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Text(Option<String>),
    Bool(Option<bool>),
    Int(Option<i32>),
    Date(Option<NaiveDate>),
    TextList(Vec<String>),
    Json(Option<JsonValue>),
}

/// Values positionally aligned to a table's columns.
pub type Row = Vec<SqlValue>;

impl SqlValue {
    pub fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlValue::Text(v) => v,
            SqlValue::Bool(v) => v,
            SqlValue::Int(v) => v,
            SqlValue::Date(v) => v,
            SqlValue::TextList(v) => v,
            SqlValue::Json(v) => v,
        }
    }

    /// Column type this value binds to.
    pub fn sql_type(&self) -> &'static str {
        match self {
            SqlValue::Text(_) => "TEXT",
            SqlValue::Bool(_) => "BOOLEAN",
            SqlValue::Int(_) => "INTEGER",
            SqlValue::Date(_) => "DATE",
            SqlValue::TextList(_) => "TEXT[]",
            SqlValue::Json(_) => "JSONB",
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            SqlValue::Text(v) => v.is_none(),
            SqlValue::Bool(v) => v.is_none(),
            SqlValue::Int(v) => v.is_none(),
            SqlValue::Date(v) => v.is_none(),
            SqlValue::TextList(_) => false,
            SqlValue::Json(v) => v.is_none(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => v.as_deref(),
            _ => None,
        }
    }
}

/// Rejects rows whose length does not match the table's column list.
pub fn check_arity(table: Table, row: &[SqlValue]) -> Result<(), RowError> {
    let expected = table.columns().len();
    if row.len() != expected {
        return Err(RowError::Arity {
            table: table.name().to_string(),
            expected,
            actual: row.len(),
        });
    }
    Ok(())
}

/// Arity check plus a per-cell check that each value binds to its column's
/// SQL type.
pub fn check_row(table: Table, row: &[SqlValue]) -> Result<(), RowError> {
    check_arity(table, row)?;
    for (cell, (column, expected)) in row.iter().zip(column_types(table)) {
        if cell.sql_type() != *expected {
            return Err(RowError::ColumnType {
                table: table.name().to_string(),
                column: column.to_string(),
                expected: *expected,
                actual: cell.sql_type(),
            });
        }
    }
    Ok(())
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(Some(value.to_string()))
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(Some(value))
    }
}

impl From<Option<String>> for SqlValue {
    fn from(value: Option<String>) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&Option<String>> for SqlValue {
    fn from(value: &Option<String>) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl From<Option<bool>> for SqlValue {
    fn from(value: Option<bool>) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<Option<i32>> for SqlValue {
    fn from(value: Option<i32>) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(Some(value))
    }
}

impl From<Option<NaiveDate>> for SqlValue {
    fn from(value: Option<NaiveDate>) -> Self {
        SqlValue::Date(value)
    }
}

impl From<Vec<String>> for SqlValue {
    fn from(value: Vec<String>) -> Self {
        SqlValue::TextList(value)
    }
}

impl From<Option<JsonValue>> for SqlValue {
    fn from(value: Option<JsonValue>) -> Self {
        SqlValue::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_nulls() {
        let values = [
            SqlValue::Text(None),
            SqlValue::Bool(None),
            SqlValue::Int(None),
            SqlValue::Date(None),
            SqlValue::Json(None),
        ];
        assert!(values.iter().all(SqlValue::is_null));
        assert!(!SqlValue::TextList(vec![]).is_null());
        assert_eq!(SqlValue::Bool(None).sql_type(), "BOOLEAN");
    }

    #[test]
    fn test_arity_check() {
        let row: Row = vec!["NCT001".into(), "PHASE2".into()];
        assert!(check_arity(Table::Phases, &row).is_ok());

        let err = check_arity(Table::Phases, &row[..1]).unwrap_err();
        assert_eq!(
            err,
            RowError::Arity {
                table: "phases".to_string(),
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn test_cell_type_must_match_column() {
        let row: Row = vec!["NCT001".into(), SqlValue::Int(Some(5))];
        assert_eq!(
            check_row(Table::Conditions, &row).unwrap_err(),
            RowError::ColumnType {
                table: "conditions".to_string(),
                column: "name".to_string(),
                expected: "TEXT",
                actual: "INTEGER",
            }
        );

        // typed NULLs are checked too
        let row: Row = vec!["NCT001".into(), SqlValue::Bool(None)];
        assert!(check_row(Table::Phases, &row).is_err());

        let row: Row = vec!["NCT001".into(), SqlValue::Text(None)];
        assert!(check_row(Table::Phases, &row).is_ok());
    }

    #[test]
    fn test_untagged_serialization() {
        let cell = SqlValue::from(Some(3));
        assert_eq!(serde_json::to_string(&cell).unwrap(), "3");
        assert_eq!(serde_json::to_string(&SqlValue::Text(None)).unwrap(), "null");
    }
}
