pub mod memory;
pub mod postgres;

use crate::errors::StorageError;
use crate::upsert::UpsertStatement;
use crate::value::Row;

/// The relational store the engine writes to, seen through the narrowest
/// interface that still supports atomic chunk writes.
///
/// Implementations acquire a connection for the duration of one call and
/// release it afterwards; nothing is shared or pooled across calls.
#[allow(async_fn_in_trait)]
pub trait Store {
    /// Applies `statement` once per row inside a single transaction.
    ///
    /// Either every row of the chunk is applied or none is: on error the
    /// transaction is rolled back and the original error returned.
    async fn write_chunk(
        &self,
        statement: &UpsertStatement,
        rows: &[Row],
    ) -> Result<(), StorageError>;

    /// Runs schema statements in order inside one transaction.
    async fn reset_schema(&self, statements: &[String]) -> Result<(), StorageError>;
}
