//! Streaming transfer between a source and its complementary target.
//!
//! One reader task fills a bounded channel with batches and one writer drains
//! it in order:
//! - memory is bounded by `batch_size * read_ahead` rows
//! - output order equals source order
//! - the first failing batch stops the run; earlier batches stay written

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::TransferSettings;
use crate::core::identifier::validate_identifier;
use crate::core::{ColumnDescriptor, ConnectorCatalog, ReadOptions, SourceDescriptor, TargetDescriptor};
use crate::error::{BridgeError, Result};
use crate::join::JoinSpec;

/// Transfer engine configuration.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Number of rows per batch.
    pub batch_size: usize,
    /// Number of read-ahead batches to buffer.
    pub read_ahead: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            read_ahead: 4,
        }
    }
}

impl From<&TransferSettings> for TransferConfig {
    fn from(settings: &TransferSettings) -> Self {
        Self {
            batch_size: settings.get_batch_size(),
            read_ahead: settings.get_read_ahead(),
        }
    }
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub source: SourceDescriptor,
    /// Selected columns in output order.
    pub columns: Vec<ColumnDescriptor>,
    pub join: Option<JoinSpec>,
    pub target: TargetDescriptor,
}

/// Progress after each committed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    pub batches_written: usize,
    pub rows_written: u64,
}

/// Outcome of one run. Never mutated after creation; a retry makes a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    /// Unique run identifier.
    pub run_id: String,

    pub success: bool,

    /// Rows transferred (success only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,

    /// Output file name or table name (success only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,

    /// Failure description (failure only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// CLI exit code of the failure (failure only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u8>,

    /// Rows committed to the target, including before a failure.
    pub rows_written: u64,

    /// Batches committed to the target.
    pub batches_written: usize,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl TransferResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs transfer jobs against the connectors of a catalog.
pub struct TransferEngine {
    catalog: ConnectorCatalog,
    config: TransferConfig,
    progress_tx: Option<mpsc::Sender<TransferProgress>>,
}

impl TransferEngine {
    /// Create a new transfer engine.
    pub fn new(catalog: ConnectorCatalog, config: TransferConfig) -> Self {
        Self {
            catalog,
            config,
            progress_tx: None,
        }
    }

    /// Report progress after every committed batch.
    ///
    /// Updates are dropped rather than stalling the transfer when the channel
    /// is full.
    pub fn with_progress(mut self, tx: mpsc::Sender<TransferProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    fn send_progress(&self, progress: TransferProgress) {
        if let Some(ref tx) = self.progress_tx {
            let _ = tx.try_send(progress);
        }
    }

    /// Execute a job. Failures are reported in the result, never as `Err`.
    pub async fn execute(&self, job: TransferJob) -> TransferResult {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(
            "Starting transfer {}: {} -> {} ({} columns, batch_size={})",
            run_id,
            job.source.label(),
            job.target.label(),
            job.columns.len(),
            self.config.batch_size
        );

        let mut progress = TransferProgress::default();
        let outcome = self.run(&job, &mut progress).await;

        let completed_at = Utc::now();
        let duration_seconds = start.elapsed().as_secs_f64();
        let mut result = TransferResult {
            run_id,
            success: false,
            row_count: None,
            target_label: None,
            message: None,
            error_code: None,
            rows_written: progress.rows_written,
            batches_written: progress.batches_written,
            started_at,
            completed_at,
            duration_seconds,
        };

        match outcome {
            Ok(()) => {
                info!(
                    "Transfer {} complete: {} rows in {} batches ({:.2}s)",
                    result.run_id, progress.rows_written, progress.batches_written, duration_seconds
                );
                result.success = true;
                result.row_count = Some(progress.rows_written);
                result.target_label = Some(job.target.label().to_string());
            }
            Err(e) => {
                error!(
                    "Transfer {} failed after {} batches ({} rows): {}",
                    result.run_id, progress.batches_written, progress.rows_written, e
                );
                result.message = Some(e.to_string());
                result.error_code = Some(e.exit_code());
            }
        }
        result
    }

    async fn run(&self, job: &TransferJob, progress: &mut TransferProgress) -> Result<()> {
        check_job(job)?;

        let source = self.catalog.for_kind(job.source.kind());
        let target = self.catalog.for_kind(job.target.kind());

        let mut writer = target.open_writer(&job.target, &job.columns).await?;

        let opts = ReadOptions {
            columns: job.columns.iter().map(|c| c.name.clone()).collect(),
            join: job.join.clone(),
            batch_size: self.config.batch_size.max(1),
            limit: None,
            read_ahead: self.config.read_ahead.max(1),
        };
        let mut rx = source.read_batches(&job.source, opts);

        while let Some(batch) = rx.recv().await {
            let batch = batch?;
            let written = writer.write_batch(&batch).await?;
            progress.batches_written += 1;
            progress.rows_written += written;
            debug!(
                "Committed batch {} ({} rows, {} total)",
                batch.sequence, written, progress.rows_written
            );
            self.send_progress(*progress);
        }

        writer.finish().await
    }
}

/// Validate a job before any I/O happens.
pub fn check_job(job: &TransferJob) -> Result<()> {
    let expected = job.source.kind().complement();
    if job.target.kind() != expected {
        return Err(BridgeError::InvalidTarget(format!(
            "a {} source must transfer to a {} target, not a {} target",
            job.source.kind(),
            expected,
            job.target.kind()
        )));
    }
    if job.columns.is_empty() {
        return Err(BridgeError::EmptySelection);
    }

    match &job.target {
        TargetDescriptor::DatabaseTable { table, .. } => validate_identifier(table)
            .map_err(|e| BridgeError::InvalidTarget(format!("target table: {}", e))),
        TargetDescriptor::FlatFile { filename, .. } => {
            crate::flatfile::resolve_output_path(std::path::Path::new(""), filename).map(|_| ())
        }
    }
}
