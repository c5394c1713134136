use anyhow::{Context, Result};
use ctgov_core::config::load_config;
use ctgov_core::store::Store;
use ctgov_core::telemetry::init_tracing;
use ctgov_core::{IngestConfig, Ingestor, MemoryStore, PostgresStore};
use tracing::{error, info};

/// Entry point for the periodic batch import, run as a container job.
///
/// What it does at a high-level:
///     Load config (`INGEST_CONFIG_PATH`, else `INGEST_CONFIG`, else defaults).
///     Optionally recreate the schema.
///     Ingest every export file given on the command line, in order.
///     Flush what is still queued and print the run metrics as JSON.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config_path = std::env::var("INGEST_CONFIG_PATH").ok();
    let config = load_config(config_path.as_deref())
        .await
        .context("Failed to load configuration")?;

    let files: Vec<String> = std::env::args().skip(1).collect();
    if files.is_empty() {
        anyhow::bail!("usage: runner-container <export.json>...");
    }

    if config.run.dry_run {
        info!("Dry run: writing to an in-memory store");
        run(config, MemoryStore::new(), &files).await
    } else {
        let store = PostgresStore::new(config.database.clone());
        run(config, store, &files).await
    }
}

async fn run<S: Store>(config: IngestConfig, store: S, files: &[String]) -> Result<()> {
    let mut ingestor = Ingestor::new(config, store)
        .await
        .context("Failed to initialize ingestor")?;

    for file in files {
        if let Err(e) = ingestor.ingest_file(file).await {
            error!(file = %file, retryable = e.is_retryable(), "Import failed: {}", e);
            // rows of studies already accepted still go out
            if let Err(flush_err) = ingestor.shutdown().await {
                error!("Flush after failure also failed: {}", flush_err);
            }
            return Err(e).with_context(|| format!("Failed to import {file}"));
        }
    }

    ingestor.shutdown().await.context("Failed to flush remaining batches")?;
    println!("{}", serde_json::to_string_pretty(ingestor.get_metrics())?);
    Ok(())
}
