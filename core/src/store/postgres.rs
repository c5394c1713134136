use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

use crate::codec::Table;
use crate::config::DbConfig;
use crate::errors::StorageError;
use crate::store::Store;
use crate::upsert::UpsertStatement;
use crate::value::Row;

/// PostgreSQL store. Opens a fresh connection per operation.
pub struct PostgresStore {
    config: DbConfig,
}

impl PostgresStore {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<Client, StorageError> {
        let (client, connection) = self
            .config
            .to_pg_config()
            .connect(NoTls)
            .await
            .map_err(|e| StorageError::Connection {
                reason: e.to_string(),
            })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("PostgreSQL connection closed with error: {}", e);
            }
        });

        Ok(client)
    }
}

impl Store for PostgresStore {
    async fn write_chunk(
        &self,
        statement: &UpsertStatement,
        rows: &[Row],
    ) -> Result<(), StorageError> {
        if rows.is_empty() {
            return Ok(());
        }

        let table = statement.table();
        let mut client = self.connect().await?;
        let transaction = client.transaction().await?;

        let outcome = async {
            let prepared = transaction.prepare(statement.sql()).await?;
            for row in rows {
                let params: Vec<_> = row.iter().map(|value| value.as_to_sql()).collect();
                transaction.execute(&prepared, &params).await?;
            }
            Ok::<_, tokio_postgres::Error>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                transaction.commit().await?;
                debug!(table = %table, rows = rows.len(), "Committed chunk");
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = transaction.rollback().await {
                    warn!(table = %table, "Rollback failed: {}", rollback);
                }
                Err(chunk_failure(table, e.is_closed(), e.to_string()))
            }
        }
    }

    async fn reset_schema(&self, statements: &[String]) -> Result<(), StorageError> {
        let mut client = self.connect().await?;
        let transaction = client.transaction().await?;
        for sql in statements {
            transaction.batch_execute(sql).await?;
        }
        transaction.commit().await?;
        Ok(())
    }
}

/// A dropped connection stays distinguishable from a rejected statement.
fn chunk_failure(table: Table, connection_closed: bool, reason: String) -> StorageError {
    if connection_closed {
        StorageError::Connection { reason }
    } else {
        StorageError::Write {
            table: table.to_string(),
            reason,
        }
    }
}
