//! Delimited flat-file connector.
//!
//! - [`UploadRegistry`]: server-assigned handles for uploaded files
//! - [`schema`]: header parsing and bounded-sample type inference
//! - [`FlatFileWriter`]: header plus per-batch flushed output
//!
//! File I/O is blocking, so schema sampling and batch reading run on the
//! blocking thread pool and hand batches back over the bounded channel.

mod registry;
pub mod schema;
mod writer;

pub use registry::UploadRegistry;
pub use writer::{resolve_output_path, FlatFileWriter};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::{
    Batch, BatchWriter, ColumnDescriptor, Connector, EndpointKind, ReadOptions, Row,
    SourceDescriptor, TargetDescriptor, Value,
};
use crate::error::{BridgeError, Result};

/// Parse a delimiter argument.
///
/// Accepts a single ASCII character, or `\t` / `tab` for tab.
pub fn parse_delimiter(s: &str) -> Result<u8> {
    match s {
        "\\t" | "\t" | "tab" | "TAB" => return Ok(b'\t'),
        _ => {}
    }
    let bytes = s.as_bytes();
    if bytes.len() != 1 || !bytes[0].is_ascii() {
        return Err(BridgeError::Config(format!(
            "delimiter must be a single ASCII character, got {:?}",
            s
        )));
    }
    match bytes[0] {
        b'"' | b'\n' | b'\r' => Err(BridgeError::Config(format!(
            "{:?} cannot be used as a delimiter",
            s
        ))),
        b => Ok(b),
    }
}

/// Connector for registered delimited files and output files.
pub struct FlatFileConnector {
    registry: Arc<UploadRegistry>,
    output_dir: PathBuf,
    sample_rows: usize,
}

impl FlatFileConnector {
    pub fn new(
        registry: Arc<UploadRegistry>,
        output_dir: impl Into<PathBuf>,
        sample_rows: usize,
    ) -> Self {
        Self {
            registry,
            output_dir: output_dir.into(),
            sample_rows,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn file_source(&self, source: &SourceDescriptor) -> Result<(PathBuf, u8, bool)> {
        match source {
            SourceDescriptor::FlatFile {
                file,
                delimiter,
                has_header,
            } => Ok((self.registry.resolve(file)?, *delimiter, *has_header)),
            SourceDescriptor::DatabaseTable { .. } => Err(BridgeError::UnsupportedOperation(
                "flat-file connector cannot read database tables".into(),
            )),
        }
    }
}

#[async_trait]
impl Connector for FlatFileConnector {
    fn kind(&self) -> EndpointKind {
        EndpointKind::FlatFile
    }

    async fn fetch_schema(&self, source: &SourceDescriptor) -> Result<Vec<ColumnDescriptor>> {
        let (path, delimiter, has_header) = self.file_source(source)?;
        let sample_rows = self.sample_rows;

        let columns = tokio::task::spawn_blocking(move || {
            schema::infer_schema(&path, delimiter, has_header, sample_rows)
        })
        .await
        .map_err(|e| BridgeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        info!(
            "Discovered {} columns in {}",
            columns.len(),
            source.label()
        );
        Ok(columns)
    }

    fn read_batches(
        &self,
        source: &SourceDescriptor,
        opts: ReadOptions,
    ) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(opts.read_ahead.max(1));

        let resolved = self.file_source(source).and_then(|resolved| {
            if opts.join.is_some() {
                Err(BridgeError::UnsupportedOperation(
                    "joins are only available for database sources".into(),
                ))
            } else {
                Ok(resolved)
            }
        });

        match resolved {
            Ok((path, delimiter, has_header)) => {
                let label = source.label();
                tokio::task::spawn_blocking(move || {
                    let result = read_file(&path, delimiter, has_header, &label, opts, &tx);
                    if let Err(e) = result {
                        let _ = tx.blocking_send(Err(e));
                    }
                });
            }
            Err(e) => {
                // Capacity is at least one, so this never blocks.
                let _ = tx.try_send(Err(e));
            }
        }

        rx
    }

    async fn open_writer(
        &self,
        target: &TargetDescriptor,
        columns: &[ColumnDescriptor],
    ) -> Result<Box<dyn BatchWriter>> {
        match target {
            TargetDescriptor::FlatFile {
                filename,
                delimiter,
            } => {
                let path = resolve_output_path(&self.output_dir, filename)?;
                let writer = FlatFileWriter::create(path, *delimiter, columns)?;
                Ok(Box::new(writer))
            }
            TargetDescriptor::DatabaseTable { .. } => Err(BridgeError::InvalidTarget(
                "flat-file connector cannot write database tables".into(),
            )),
        }
    }
}

/// Blocking read loop: project the requested columns and send batches.
fn read_file(
    path: &Path,
    delimiter: u8,
    has_header: bool,
    label: &str,
    opts: ReadOptions,
    tx: &mpsc::Sender<Result<Batch>>,
) -> Result<()> {
    let mut reader = schema::open_reader(path, delimiter)?;
    let mut records = reader.records();

    let first = match records.next() {
        Some(record) => record?,
        None => return Err(BridgeError::Schema("file is empty".into())),
    };
    let names = schema::column_names(&first, has_header)?;

    let indices = opts
        .columns
        .iter()
        .map(|col| {
            names
                .iter()
                .position(|n| n == col)
                .ok_or_else(|| BridgeError::UnknownColumn(col.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    let project = |record: &csv::StringRecord| -> Row {
        indices
            .iter()
            .map(|&i| Value::Text(record.get(i).unwrap_or_default().to_string()))
            .collect()
    };

    let batch_size = opts.batch_size.max(1);
    let limit = opts.limit.unwrap_or(usize::MAX);
    let mut rows: Vec<Row> = Vec::with_capacity(batch_size.min(limit));
    let mut produced = 0usize;
    let mut sequence = 0usize;

    let mut pending = if has_header { None } else { Some(Ok(first)) };
    while produced < limit {
        let record = match pending.take().or_else(|| records.next()) {
            Some(record) => record?,
            None => break,
        };
        rows.push(project(&record));
        produced += 1;

        if rows.len() >= batch_size {
            sequence += 1;
            let batch = Batch::new(sequence, std::mem::take(&mut rows));
            debug!("Read batch {} ({} rows) from {}", sequence, batch.len(), label);
            if tx.blocking_send(Ok(batch)).is_err() {
                // Consumer went away.
                return Ok(());
            }
        }
    }

    if !rows.is_empty() {
        sequence += 1;
        let _ = tx.blocking_send(Ok(Batch::new(sequence, rows)));
    }
    Ok(())
}
