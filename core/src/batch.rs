use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::codec::Table;
use crate::errors::{IngestionError, Result, RowError};
use crate::sink::Sink;
use crate::store::Store;
use crate::upsert::{UpsertExecutor, DEFAULT_CHUNK_SIZE};
use crate::value::{check_row, Row};

/// Rows buffered per table before an automatic flush.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 300;

#[derive(Debug, Default, Clone, Serialize)]
pub struct QueueStats {
    pub rows_enqueued: usize,
    pub flushes: usize,
    pub failed_flushes: usize,
    pub chunks_written: usize,
    pub rows_flushed: usize,
}

/// Per-table row buffers for one run.
///
/// A table's buffer is flushed as soon as it reaches `max_queue_size` rows,
/// and on demand through [`BatchQueue::flush`] / [`BatchQueue::flush_all`].
/// A failed flush leaves its rows queued so the same rows can be retried.
pub struct BatchQueue<S: Store> {
    executor: UpsertExecutor<S>,
    pending: BTreeMap<Table, Vec<Row>>,
    max_queue_size: usize,
    chunk_size: usize,
    stats: QueueStats,
}

impl<S: Store> BatchQueue<S> {
    pub fn new(store: S) -> Self {
        Self::build(store, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_CHUNK_SIZE)
    }

    /// Rejects a zero queue size or chunk size.
    pub fn with_limits(store: S, max_queue_size: usize, chunk_size: usize) -> Result<Self> {
        if max_queue_size == 0 {
            return Err(RowError::ZeroQueueSize.into());
        }
        if chunk_size == 0 {
            return Err(RowError::ZeroChunkSize.into());
        }
        Ok(Self::build(store, max_queue_size, chunk_size))
    }

    fn build(store: S, max_queue_size: usize, chunk_size: usize) -> Self {
        Self {
            executor: UpsertExecutor::new(store),
            pending: BTreeMap::new(),
            max_queue_size,
            chunk_size,
            stats: QueueStats::default(),
        }
    }

    pub fn executor(&self) -> &UpsertExecutor<S> {
        &self.executor
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    /// Number of rows waiting for `table`.
    pub fn pending(&self, table: Table) -> usize {
        self.pending.get(&table).map_or(0, Vec::len)
    }

    pub fn pending_rows(&self, table: Table) -> &[Row] {
        self.pending.get(&table).map_or(&[], Vec::as_slice)
    }

    /// Tables that currently hold unflushed rows.
    pub fn pending_tables(&self) -> Vec<Table> {
        self.pending
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(table, _)| *table)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.values().all(Vec::is_empty)
    }

    /// Queues `row`; flushes the table before returning once its buffer is
    /// full.
    pub async fn add(&mut self, table: Table, row: Row) -> Result<()> {
        check_row(table, &row)?;

        let buffer = self.pending.entry(table).or_default();
        buffer.push(row);
        let queued = buffer.len();
        self.stats.rows_enqueued += 1;

        if queued >= self.max_queue_size {
            debug!(table = %table, rows = queued, "Queue full, flushing");
            self.flush(table).await?;
        }
        Ok(())
    }

    /// Sends everything queued for `table`, whatever its size.
    pub async fn flush(&mut self, table: Table) -> Result<()> {
        let Some(rows) = self.pending.get(&table).filter(|rows| !rows.is_empty()) else {
            return Ok(());
        };
        let count = rows.len();

        match self.executor.batch_upsert(table, rows, self.chunk_size).await {
            Ok(chunks) => {
                self.stats.flushes += 1;
                self.stats.chunks_written += chunks;
                self.stats.rows_flushed += count;
                if let Some(rows) = self.pending.get_mut(&table) {
                    rows.clear();
                }
                info!(table = %table, rows = count, chunks, "Flushed batch");
                Ok(())
            }
            Err(err) => {
                self.stats.failed_flushes += 1;
                error!(table = %table, rows = count, "Error flushing batch: {}", err);
                Err(match err {
                    IngestionError::Storage(source) => IngestionError::BatchFlush {
                        table: table.to_string(),
                        source,
                    },
                    other => other,
                })
            }
        }
    }

    /// Flushes every non-empty buffer, in table order. Stops at the first
    /// failure; later tables are left queued.
    pub async fn flush_all(&mut self) -> Result<()> {
        for table in self.pending_tables() {
            self.flush(table).await?;
        }
        Ok(())
    }
}

impl<S: Store> Sink for BatchQueue<S> {
    async fn submit(&mut self, table: Table, row: Row) -> Result<()> {
        self.add(table, row).await
    }
}

impl<S: Store> Drop for BatchQueue<S> {
    fn drop(&mut self) {
        let unflushed: usize = self.pending.values().map(Vec::len).sum();
        if unflushed > 0 {
            warn!(
                rows = unflushed,
                tables = ?self.pending_tables(),
                "Batch queue dropped with unflushed rows"
            );
        }
    }
}
