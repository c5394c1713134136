use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::codec::Table;
use crate::errors::StorageError;
use crate::store::Store;
use crate::upsert::UpsertStatement;
use crate::value::Row;

/// One committed chunk, as observed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkWrite {
    pub table: Table,
    pub rows: usize,
}

#[derive(Default)]
struct State {
    // conflict-key rendering -> stored row
    tables: HashMap<Table, HashMap<Vec<String>, Row>>,
    writes: Vec<ChunkWrite>,
    // table -> chunks still allowed before writes start failing
    failures: HashMap<Table, usize>,
    schema_resets: usize,
}

/// In-process store with the same insert-or-update semantics as the
/// PostgreSQL statement. Used for dry runs and tests.
///
/// Clones share state, so a handle kept outside the engine can inspect what
/// was written.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every write to `table` fails until [`MemoryStore::heal`] is called.
    pub fn fail_table(&self, table: Table) {
        self.fail_after(table, 0);
    }

    /// Lets `chunks` more writes to `table` succeed, then fails the rest.
    pub fn fail_after(&self, table: Table, chunks: usize) {
        self.lock().failures.insert(table, chunks);
    }

    pub fn heal(&self, table: Table) {
        self.lock().failures.remove(&table);
    }

    pub fn writes(&self) -> Vec<ChunkWrite> {
        self.lock().writes.clone()
    }

    pub fn writes_to(&self, table: Table) -> usize {
        self.lock().writes.iter().filter(|w| w.table == table).count()
    }

    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.lock()
            .tables
            .get(&table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: Table) -> usize {
        self.lock().tables.get(&table).map_or(0, HashMap::len)
    }

    pub fn schema_resets(&self) -> usize {
        self.lock().schema_resets
    }
}

fn conflict_key(table: Table, row: &Row) -> Vec<String> {
    table
        .conflict_positions()
        .into_iter()
        .map(|i| serde_json::to_string(&row[i]).unwrap_or_default())
        .collect()
}

impl Store for MemoryStore {
    async fn write_chunk(
        &self,
        statement: &UpsertStatement,
        rows: &[Row],
    ) -> Result<(), StorageError> {
        let table = statement.table();
        let mut state = self.lock();

        if let Some(remaining) = state.failures.get_mut(&table) {
            if *remaining == 0 {
                return Err(StorageError::Write {
                    table: table.to_string(),
                    reason: "simulated write failure".to_string(),
                });
            }
            *remaining -= 1;
        }

        let expected = table.columns().len();
        if let Some(row) = rows.iter().find(|row| row.len() != expected) {
            return Err(StorageError::Write {
                table: table.to_string(),
                reason: format!("expected {expected} values, got {}", row.len()),
            });
        }

        // conflict columns already match, so replacing the row updates exactly
        // the non-key columns
        let stored = state.tables.entry(table).or_default();
        for row in rows {
            stored.insert(conflict_key(table, row), row.clone());
        }
        state.writes.push(ChunkWrite {
            table,
            rows: rows.len(),
        });
        debug!(table = %table, rows = rows.len(), "Applied chunk in memory");
        Ok(())
    }

    async fn reset_schema(&self, statements: &[String]) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.tables.clear();
        state.schema_resets += 1;
        debug!(statements = statements.len(), "Reset in-memory schema");
        Ok(())
    }
}
