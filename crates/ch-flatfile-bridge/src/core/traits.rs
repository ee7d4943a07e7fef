//! The connector capability shared by both endpoint kinds.
//!
//! - [`Connector`]: connection checks, schema discovery, batched reads and
//!   writer creation
//! - [`BatchWriter`]: append-ordered sink for one transfer
//!
//! The orchestration code only ever talks to these traits; the concrete
//! ClickHouse and flat-file connectors are picked by descriptor kind through
//! the [`ConnectorCatalog`](super::catalog::ConnectorCatalog).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{BridgeError, Result};
use crate::join::JoinSpec;

use super::schema::{
    ColumnDescriptor, ConnectionParams, EndpointKind, SourceDescriptor, TargetDescriptor,
};
use super::value::Batch;

/// Options for reading rows from a source.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Columns to read, in output order.
    pub columns: Vec<String>,
    /// Optional join against a second database table.
    pub join: Option<JoinSpec>,
    /// Number of rows per batch.
    pub batch_size: usize,
    /// Stop after this many rows (pushed down to the source).
    pub limit: Option<usize>,
    /// Number of batches the reader may run ahead of the consumer.
    pub read_ahead: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            join: None,
            batch_size: 10_000,
            limit: None,
            read_ahead: 4,
        }
    }
}

/// Read and write access to one kind of endpoint.
///
/// # Streaming
///
/// [`read_batches`](Connector::read_batches) returns a bounded channel receiver.
/// The connector spawns a background task that fills it, so a slow consumer
/// applies backpressure to the reader and memory stays bounded by
/// `batch_size * read_ahead` rows.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The endpoint kind this connector serves.
    fn kind(&self) -> EndpointKind;

    /// Test a database connection.
    async fn ping(&self, _connection: &ConnectionParams) -> Result<()> {
        Err(BridgeError::UnsupportedOperation(format!(
            "{} endpoints have no connection to test",
            self.kind()
        )))
    }

    /// Table names of a database connection.
    async fn list_tables(&self, _connection: &ConnectionParams) -> Result<Vec<String>> {
        Err(BridgeError::UnsupportedOperation(format!(
            "{} endpoints have no tables",
            self.kind()
        )))
    }

    /// Discover the ordered column list of a source.
    async fn fetch_schema(&self, source: &SourceDescriptor) -> Result<Vec<ColumnDescriptor>>;

    /// Start streaming rows.
    ///
    /// Yields `Result<Batch>` in source order until the source is exhausted or
    /// `opts.limit` rows were produced. An `Err` item ends the stream.
    fn read_batches(
        &self,
        source: &SourceDescriptor,
        opts: ReadOptions,
    ) -> mpsc::Receiver<Result<Batch>>;

    /// Open a writer for a target.
    ///
    /// `columns` describes the rows that will be written, in order; database
    /// targets use it to create a missing table.
    async fn open_writer(
        &self,
        target: &TargetDescriptor,
        columns: &[ColumnDescriptor],
    ) -> Result<Box<dyn BatchWriter>>;
}

/// Append-ordered sink for the batches of one transfer.
///
/// Every successful `write_batch` is durable on its own; there is no rollback.
#[async_trait]
pub trait BatchWriter: Send {
    /// Write one batch; returns the number of rows committed.
    async fn write_batch(&mut self, batch: &Batch) -> Result<u64>;

    /// Flush and release resources.
    async fn finish(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_options_default() {
        let opts = ReadOptions::default();
        assert_eq!(opts.batch_size, 10_000);
        assert!(opts.columns.is_empty());
        assert!(opts.limit.is_none());
        assert!(opts.join.is_none());
    }
}
