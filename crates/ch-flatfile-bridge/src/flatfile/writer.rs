//! Delimited file writer for database exports.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::core::{Batch, BatchWriter, ColumnDescriptor, Value};
use crate::error::{BridgeError, Result};

/// Check that `filename` is a bare file name, then place it in `output_dir`.
pub fn resolve_output_path(output_dir: &Path, filename: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| {
        BridgeError::InvalidTarget(format!("output file name '{}' {}", filename, reason))
    };

    if filename.trim().is_empty() {
        return Err(invalid("is empty"));
    }
    if filename.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
        return Err(invalid("must not contain path separators"));
    }
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(output_dir.join(filename)),
        _ => Err(invalid("must be a plain file name")),
    }
}

/// Writes a header row, then one flushed chunk per batch.
///
/// File IO runs on the blocking pool; the writer is moved there and back for
/// each batch.
pub struct FlatFileWriter {
    writer: Option<csv::Writer<File>>,
    path: PathBuf,
    rows_written: u64,
}

impl FlatFileWriter {
    /// Create (or truncate) the file and write the header.
    pub fn create(path: PathBuf, delimiter: u8, columns: &[ColumnDescriptor]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(&path)?;
        writer.write_record(columns.iter().map(|c| c.name.as_str()))?;
        writer.flush()?;

        info!("Writing {} columns to {}", columns.len(), path.display());
        Ok(Self {
            writer: Some(writer),
            path,
            rows_written: 0,
        })
    }

    /// Run `f` against the underlying writer on the blocking pool.
    async fn on_blocking<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut csv::Writer<File>) -> Result<()> + Send + 'static,
    {
        let mut writer = self.writer.take().ok_or_else(|| {
            BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!(
                    "writer for {} was lost after an earlier failure",
                    self.path.display()
                ),
            ))
        })?;

        let (writer, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut writer);
            (writer, result)
        })
        .await
        .map_err(|e| BridgeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        self.writer = Some(writer);
        result
    }
}

#[async_trait]
impl BatchWriter for FlatFileWriter {
    async fn write_batch(&mut self, batch: &Batch) -> Result<u64> {
        let records: Vec<Vec<String>> = batch
            .rows
            .iter()
            .map(|row| row.iter().map(Value::to_display).collect())
            .collect();

        self.on_blocking(move |writer| {
            for record in &records {
                writer.write_record(record)?;
            }
            writer.flush()?;
            Ok(())
        })
        .await?;

        let n = batch.len() as u64;
        self.rows_written += n;
        debug!(
            "Wrote batch {} ({} rows) to {}",
            batch.sequence,
            n,
            self.path.display()
        );
        Ok(n)
    }

    async fn finish(&mut self) -> Result<()> {
        self.on_blocking(|writer| Ok(writer.flush()?)).await?;
        info!(
            "Finished writing {} rows to {}",
            self.rows_written,
            self.path.display()
        );
        Ok(())
    }
}
