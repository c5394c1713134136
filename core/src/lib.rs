pub mod batch;
pub mod codec;
pub mod config;
pub mod decompose;
pub mod errors;
pub mod ingestor;
pub mod schema;
pub mod sink;
pub mod store;
pub mod study;
pub mod telemetry;
pub mod upsert;
pub mod value;

pub use batch::BatchQueue;
pub use codec::{columns_for, conflict_columns_for, Table};
pub use config::IngestConfig;
pub use decompose::{decompose, migrate, Decomposition};
pub use errors::{IngestionError, Result};
pub use ingestor::Ingestor;
pub use store::{memory::MemoryStore, postgres::PostgresStore, Store};
pub use study::Study;
pub use upsert::UpsertExecutor;
pub use value::{Row, SqlValue};
