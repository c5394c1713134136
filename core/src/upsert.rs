use tracing::debug;

use crate::codec::Table;
use crate::errors::{Result, RowError};
use crate::sink::Sink;
use crate::store::Store;
use crate::value::{check_row, Row};

/// Rows per transaction when the caller does not say otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Parameterized insert-or-update statement for one table.
///
/// Identifiers come from the table registry and are always quoted; values are
/// bound as `$n` placeholders, never interpolated.
#[derive(Debug, Clone)]
pub struct UpsertStatement {
    table: Table,
    sql: String,
}

impl UpsertStatement {
    pub fn for_table(table: Table) -> Self {
        let columns = table.columns();
        let column_list = join_quoted(columns.iter().copied());
        let placeholders = (1..=columns.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let conflict_list = join_quoted(table.conflict_columns().iter().copied());

        let updates = table
            .update_columns()
            .map(|column| format!("{} = EXCLUDED.{}", quote_ident(column), quote_ident(column)))
            .collect::<Vec<_>>();
        let action = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        let sql = format!(
            "INSERT INTO {} ({column_list}) VALUES ({placeholders}) ON CONFLICT ({conflict_list}) {action}",
            quote_ident(table.name()),
        );

        Self { table, sql }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub(crate) fn join_quoted<'a>(idents: impl Iterator<Item = &'a str>) -> String {
    idents.map(quote_ident).collect::<Vec<_>>().join(", ")
}

/// Issues idempotent writes against a [`Store`]: insert each row, or update
/// the non-key columns of the row that already holds the same conflict key.
pub struct UpsertExecutor<S> {
    store: S,
}

impl<S: Store> UpsertExecutor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Writes exactly one row in its own transaction.
    pub async fn upsert(&self, table: Table, row: &Row) -> Result<()> {
        check_row(table, row)?;
        let statement = UpsertStatement::for_table(table);
        self.store
            .write_chunk(&statement, std::slice::from_ref(row))
            .await?;
        Ok(())
    }

    /// Writes `rows` in chunks of at most `chunk_size`, one transaction per
    /// chunk, and returns the number of chunks committed.
    ///
    /// Every row is checked before the first chunk is sent. Chunks committed
    /// before a failing chunk stay committed.
    pub async fn batch_upsert(
        &self,
        table: Table,
        rows: &[Row],
        chunk_size: usize,
    ) -> Result<usize> {
        if chunk_size == 0 {
            return Err(RowError::ZeroChunkSize.into());
        }
        for row in rows {
            check_row(table, row)?;
        }

        let statement = UpsertStatement::for_table(table);
        let mut written = 0;
        for chunk in rows.chunks(chunk_size) {
            self.store.write_chunk(&statement, chunk).await?;
            written += 1;
            debug!(table = %table, rows = chunk.len(), chunk = written, "Wrote chunk");
        }
        Ok(written)
    }
}

/// Unbuffered mode: every submitted row is written immediately.
impl<S: Store> Sink for UpsertExecutor<S> {
    async fn submit(&mut self, table: Table, row: Row) -> Result<()> {
        self.upsert(table, &row).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IngestionError;
    use crate::store::memory::MemoryStore;
    use crate::value::SqlValue;

    fn identification_row(nct_id: &str, brief_title: &str) -> Row {
        let mut row: Row = vec![SqlValue::Text(None); Table::Identification.columns().len()];
        row[0] = nct_id.into();
        row[1] = SqlValue::TextList(vec![]);
        row[2] = SqlValue::Int(None);
        row[6] = SqlValue::Int(None);
        row[7] = brief_title.into();
        row[14] = SqlValue::Int(Some(0));
        row
    }

    fn condition_rows(count: usize) -> Vec<Row> {
        (0..count)
            .map(|i| -> Row { vec!["NCT001".into(), format!("condition-{i}").into()] })
            .collect()
    }

    #[test]
    fn test_statement_updates_only_non_key_columns() {
        let statement = UpsertStatement::for_table(Table::Phases);
        assert_eq!(
            statement.sql(),
            "INSERT INTO \"phases\" (\"nct_id\", \"phase\") VALUES ($1, $2) \
             ON CONFLICT (\"nct_id\", \"phase\") DO NOTHING"
        );

        let statement = UpsertStatement::for_table(Table::Facility);
        assert!(statement.sql().ends_with(
            "ON CONFLICT (\"nct_id\", \"name\", \"status\", \"city\", \"state\", \"zip\", \"country\") \
             DO UPDATE SET \"contacts\" = EXCLUDED.\"contacts\""
        ));
    }

    #[test]
    fn test_statement_binds_every_column() {
        let statement = UpsertStatement::for_table(Table::Status);
        assert!(statement.sql().contains("$17"));
        assert!(!statement.sql().contains("$18"));
        assert!(!statement.sql().contains("\"nct_id\" = EXCLUDED"));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_conflict_key() {
        let store = MemoryStore::new();
        let executor = UpsertExecutor::new(store.clone());

        executor
            .upsert(Table::Identification, &identification_row("NCT001", "A"))
            .await
            .unwrap();
        executor
            .upsert(Table::Identification, &identification_row("NCT001", "B"))
            .await
            .unwrap();

        let rows = store.rows(Table::Identification);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][7].as_text(), Some("B"));
    }

    #[tokio::test]
    async fn test_batch_upsert_splits_into_chunks() {
        let store = MemoryStore::new();
        let executor = UpsertExecutor::new(store.clone());

        let chunks = executor
            .batch_upsert(Table::Conditions, &condition_rows(250), 100)
            .await
            .unwrap();

        assert_eq!(chunks, 3);
        let sizes: Vec<usize> = store.writes().iter().map(|w| w.rows).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(store.row_count(Table::Conditions), 250);
    }

    #[tokio::test]
    async fn test_malformed_row_rejected_before_any_write() {
        let store = MemoryStore::new();
        let executor = UpsertExecutor::new(store.clone());

        let mut rows = condition_rows(150);
        rows[120].pop();

        let err = executor
            .batch_upsert(Table::Conditions, &rows, 100)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestionError::Row(RowError::Arity { .. })));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_mistyped_cell_rejected_before_any_write() {
        let store = MemoryStore::new();
        let executor = UpsertExecutor::new(store.clone());

        let mut rows = condition_rows(150);
        rows[120][1] = SqlValue::Int(Some(5));

        let err = executor
            .batch_upsert(Table::Conditions, &rows, 100)
            .await
            .unwrap_err();

        match err {
            IngestionError::Row(RowError::ColumnType { table, column, .. }) => {
                assert_eq!(table, "conditions");
                assert_eq!(column, "name");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.writes().is_empty());

        let err = executor
            .upsert(Table::Conditions, &rows[120])
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::Row(RowError::ColumnType { .. })));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_zero_chunk_size_is_rejected() {
        let executor = UpsertExecutor::new(MemoryStore::new());
        let err = executor
            .batch_upsert(Table::Conditions, &condition_rows(1), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::Row(RowError::ZeroChunkSize)));
    }

    #[tokio::test]
    async fn test_failing_chunk_keeps_earlier_chunks() {
        let store = MemoryStore::new();
        store.fail_after(Table::Conditions, 1);
        let executor = UpsertExecutor::new(store.clone());

        let err = executor
            .batch_upsert(Table::Conditions, &condition_rows(250), 100)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestionError::Storage(_)));
        // first chunk committed, the failing one rolled back entirely
        assert_eq!(store.row_count(Table::Conditions), 100);
        assert_eq!(store.writes().len(), 1);
    }
}
