use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    UnknownTable(#[from] UnknownTableError),

    #[error("Row rejected: {0}")]
    Row(#[from] RowError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A buffered table could not be flushed. The rows stay queued.
    #[error("Failed to flush batch for table {table}: {source}")]
    BatchFlush {
        table: String,
        #[source]
        source: StorageError,
    },

    #[error("Record {record} failed validation: {source}")]
    Validation {
        record: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// The table name is not part of the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown table: {table}")]
pub struct UnknownTableError {
    pub table: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("table {table} expects {expected} values, got {actual}")]
    Arity {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("table {table} column {column} expects {expected}, got {actual}")]
    ColumnType {
        table: String,
        column: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("queue size must be greater than zero")]
    ZeroQueueSize,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to connect to the database: {reason}")]
    Connection { reason: String },

    #[error("Failed to write to table {table}: {reason}")]
    Write { table: String, reason: String },

    #[error("Transaction failed: {reason}")]
    Transaction { reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Failed to load configuration from {origin}: {error}")]
    LoadFailed {
        origin: String,
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON serialization failed: {reason}")]
    Json { reason: String },

    #[error("YAML serialization failed: {reason}")]
    Yaml { reason: String },

    #[error("Export file {path} is not a study list: {reason}")]
    ExportShape { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, IngestionError>;

impl From<serde_json::Error> for IngestionError {
    fn from(err: serde_json::Error) -> Self {
        IngestionError::Serialization(SerializationError::Json {
            reason: err.to_string(),
        })
    }
}

impl From<serde_yaml::Error> for IngestionError {
    fn from(err: serde_yaml::Error) -> Self {
        IngestionError::Serialization(SerializationError::Yaml {
            reason: err.to_string(),
        })
    }
}

impl IngestionError {
    /// Whether re-running the failed operation may succeed. The engine never
    /// retries on its own; this only informs the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestionError::Storage(StorageError::Connection { .. }) => true,
            IngestionError::Storage(StorageError::Transaction { .. }) => true,
            IngestionError::BatchFlush { source, .. } => {
                matches!(source, StorageError::Connection { .. } | StorageError::Transaction { .. })
            }
            IngestionError::Io(_) => true,
            _ => false,
        }
    }

    /// Table the failure is attributed to, when there is one.
    pub fn table(&self) -> Option<&str> {
        match self {
            IngestionError::BatchFlush { table, .. } => Some(table),
            IngestionError::Storage(StorageError::Write { table, .. }) => Some(table),
            IngestionError::Row(RowError::Arity { table, .. }) => Some(table),
            IngestionError::Row(RowError::ColumnType { table, .. }) => Some(table),
            IngestionError::UnknownTable(err) => Some(&err.table),
            _ => None,
        }
    }
}

impl From<tokio_postgres::Error> for StorageError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            StorageError::Connection {
                reason: err.to_string(),
            }
        } else {
            StorageError::Transaction {
                reason: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_loss_is_retryable() {
        let err = IngestionError::Storage(StorageError::Connection {
            reason: "connection refused".to_string(),
        });
        assert!(err.is_retryable());
        assert_eq!(err.table(), None);
    }

    #[test]
    fn test_flush_error_names_table() {
        let err = IngestionError::BatchFlush {
            table: "conditions".to_string(),
            source: StorageError::Write {
                table: "conditions".to_string(),
                reason: "duplicate key".to_string(),
            },
        };
        assert!(!err.is_retryable());
        assert_eq!(err.table(), Some("conditions"));
        assert!(err.to_string().contains("conditions"));
    }

    #[test]
    fn test_codec_errors_are_not_retryable() {
        let unknown = IngestionError::from(UnknownTableError {
            table: "adverse_events".to_string(),
        });
        assert!(!unknown.is_retryable());
        assert_eq!(unknown.to_string(), "Unknown table: adverse_events");

        let arity = IngestionError::from(RowError::Arity {
            table: "phases".to_string(),
            expected: 2,
            actual: 1,
        });
        assert!(!arity.is_retryable());
        assert_eq!(arity.table(), Some("phases"));
    }
}
