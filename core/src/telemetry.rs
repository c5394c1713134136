use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::batch::QueueStats;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ctgov_core=info,runner_container=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestMetrics {
    pub total_records: usize,
    pub successful_records: usize,
    pub failed_records: usize,
    pub dead_lettered_records: usize,
    pub rows_submitted: usize,
    pub direct_writes: usize,
    pub flushes: usize,
    pub failed_flushes: usize,
    pub chunks_written: usize,
    pub rows_flushed: usize,
    pub avg_rows_per_record: f64,
}

impl IngestMetrics {
    pub(crate) fn record_success(&mut self, rows: usize) {
        self.successful_records += 1;
        self.rows_submitted += rows;
        self.avg_rows_per_record = self.rows_submitted as f64 / self.successful_records as f64;
    }

    pub(crate) fn absorb_queue_stats(&mut self, stats: &QueueStats) {
        self.flushes = stats.flushes;
        self.failed_flushes = stats.failed_flushes;
        self.chunks_written = stats.chunks_written;
        self.rows_flushed = stats.rows_flushed;
    }
}
