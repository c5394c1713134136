use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{error, info, warn};

use crate::batch::BatchQueue;
use crate::codec::Table;
use crate::config::{IngestConfig, WriteMode};
use crate::decompose::decompose;
use crate::errors::{IngestionError, Result, SerializationError};
use crate::schema::init_schema;
use crate::store::Store;
use crate::study::Study;
use crate::telemetry::IngestMetrics;

/// The ingestor drives one import run: decompose each study, route its rows
/// to the store, and drain whatever is still buffered at the end.
///
/// In batched mode the primary row of every study is written straight away
/// and only dependent rows are queued, so no dependent row can reach the
/// store before the row it references.
pub struct Ingestor<S: Store> {
    config: IngestConfig,
    queue: BatchQueue<S>,
    metrics: IngestMetrics,
}

impl<S: Store> Ingestor<S> {
    pub async fn new(config: IngestConfig, store: S) -> Result<Self> {
        config.validate()?;

        if config.run.init_schema {
            init_schema(&store).await?;
        }

        let queue =
            BatchQueue::with_limits(store, config.batch.max_queue_size, config.batch.chunk_size)?;
        info!(
            mode = ?config.batch.mode,
            max_queue_size = config.batch.max_queue_size,
            chunk_size = config.batch.chunk_size,
            "Ingestor ready"
        );

        Ok(Self {
            config,
            queue,
            metrics: IngestMetrics::default(),
        })
    }

    pub fn queue(&self) -> &BatchQueue<S> {
        &self.queue
    }

    /// Decomposes `study` and routes its rows; returns the number of rows
    /// produced.
    pub async fn ingest(&mut self, study: &Study) -> Result<usize> {
        self.metrics.total_records += 1;
        match self.route(study).await {
            Ok(rows) => {
                self.metrics.record_success(rows);
                self.metrics.absorb_queue_stats(self.queue.stats());
                Ok(rows)
            }
            Err(e) => {
                self.metrics.failed_records += 1;
                self.metrics.absorb_queue_stats(self.queue.stats());
                error!(nct_id = study.nct_id(), "Failed to ingest study: {}", e);
                Err(e)
            }
        }
    }

    async fn route(&mut self, study: &Study) -> Result<usize> {
        let decomposition = decompose(study);
        let count = decomposition.len();

        match self.config.batch.mode {
            WriteMode::Direct => {
                for (table, row) in decomposition.rows() {
                    self.queue.executor().upsert(*table, row).await?;
                    self.metrics.direct_writes += 1;
                }
            }
            WriteMode::Batched => {
                let (primary, dependents) = decomposition.into_parts();
                self.queue.executor().upsert(Table::PRIMARY, &primary).await?;
                self.metrics.direct_writes += 1;
                for (table, row) in dependents {
                    self.queue.add(table, row).await?;
                }
            }
        }
        Ok(count)
    }

    /// Ingests every study of a bulk export: either a top-level array of
    /// studies or an object holding them under `studies`.
    ///
    /// Stops at the first record that fails. That record is copied to the
    /// dead-letter directory, when one is configured, before the error is
    /// returned.
    pub async fn ingest_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let records = export_records(path, serde_json::from_str(&content)?)?;
        info!(path = %path.display(), records = records.len(), "Ingesting export file");

        let mut ingested = 0;
        for (index, raw) in records.into_iter().enumerate() {
            let record = record_id(&raw, index);
            let result = match serde_json::from_value::<Study>(raw.clone()) {
                Ok(study) => self.ingest(&study).await,
                Err(source) => {
                    self.metrics.total_records += 1;
                    self.metrics.failed_records += 1;
                    warn!(record = %record, "Study failed validation: {}", source);
                    Err(IngestionError::Validation {
                        record: record.clone(),
                        source,
                    })
                }
            };

            if let Err(e) = result {
                self.dead_letter(&record, &raw).await;
                return Err(e);
            }
            ingested += 1;
        }

        info!(path = %path.display(), records = ingested, "Finished export file");
        Ok(ingested)
    }

    async fn dead_letter(&mut self, record: &str, raw: &Value) {
        let Some(dir) = self.config.run.dead_letter_dir.clone() else {
            return;
        };
        match write_dead_letter(&dir, record, raw).await {
            Ok(path) => {
                self.metrics.dead_lettered_records += 1;
                warn!(path = %path.display(), "Wrote record to dead-letter directory");
            }
            Err(e) => error!(record, "Could not write dead-letter record: {}", e),
        }
    }

    /// Flushes every queued row. Must be called once the run has submitted
    /// its last study.
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down ingestor, flushing remaining batches");
        let result = self.queue.flush_all().await;
        self.metrics.absorb_queue_stats(self.queue.stats());
        result?;
        info!(metrics = ?self.metrics, "Ingestion run complete");
        Ok(())
    }

    pub fn get_metrics(&self) -> &IngestMetrics {
        &self.metrics
    }
}

fn export_records(path: &Path, document: Value) -> Result<Vec<Value>> {
    match document {
        Value::Array(records) => Ok(records),
        Value::Object(mut object) => match object.remove("studies") {
            Some(Value::Array(records)) => Ok(records),
            _ => Err(SerializationError::ExportShape {
                path: path.display().to_string(),
                reason: "object has no `studies` array".to_string(),
            }
            .into()),
        },
        _ => Err(SerializationError::ExportShape {
            path: path.display().to_string(),
            reason: "expected an array of studies".to_string(),
        }
        .into()),
    }
}

/// The record's NCT id when it has one, its position in the file otherwise.
fn record_id(raw: &Value, index: usize) -> String {
    raw.pointer("/protocolSection/identificationModule/nctId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                .collect()
        })
        .unwrap_or_else(|| index.to_string())
}

async fn write_dead_letter(dir: &Path, record: &str, raw: &Value) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{record}.json"));
    tokio::fs::write(&path, serde_json::to_vec_pretty(raw)?).await?;
    Ok(path)
}
