use crate::codec::Table;
use crate::errors::Result;
use crate::value::Row;

/// Destination for decomposed rows.
///
/// The batch queue buffers what it is given; the upsert executor writes it
/// straight through. The decomposer does not know which one it is feeding.
#[allow(async_fn_in_trait)]
pub trait Sink {
    async fn submit(&mut self, table: Table, row: Row) -> Result<()>;
}
