//! Shared fixtures: an in-memory database connector and a workflow wired to
//! it plus the real flat-file connector on a temporary directory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use ch_flatfile_bridge::{
    Batch, BatchWriter, BridgeError, ColumnDescriptor, ConnectionParams, Connector,
    ConnectorCatalog, EndpointKind, FlatFileConnector, ReadOptions, Result, Row,
    SourceDescriptor, TargetDescriptor, TransferSettings, UploadRegistry, Value, Workflow,
};

type Tables = Arc<Mutex<HashMap<String, (Vec<ColumnDescriptor>, Vec<Row>)>>>;

/// Database double holding tables in memory, with injectable failures.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: Tables,
    /// Fail the read when this 1-based batch is reached (0 = never).
    pub fail_read_at_batch: AtomicUsize,
    /// Fail the write of this 1-based batch (0 = never).
    pub fail_write_at_batch: AtomicUsize,
    pub fail_connect: AtomicBool,
    /// Options of the most recent read.
    pub last_read: Mutex<Option<ReadOptions>>,
}

impl MemoryDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_table(&self, name: &str, columns: Vec<ColumnDescriptor>, rows: Vec<Row>) {
        self.tables
            .lock()
            .unwrap()
            .insert(name.to_string(), (columns, rows));
    }

    pub fn rows(&self, name: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(name)
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default()
    }

    pub fn columns(&self, name: &str) -> Vec<ColumnDescriptor> {
        self.tables
            .lock()
            .unwrap()
            .get(name)
            .map(|(cols, _)| cols.clone())
            .unwrap_or_default()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.lock().unwrap().contains_key(name)
    }
}

fn table_of(source: &SourceDescriptor) -> Result<&str> {
    match source {
        SourceDescriptor::DatabaseTable { table, .. } => Ok(table),
        SourceDescriptor::FlatFile { .. } => {
            Err(BridgeError::UnsupportedOperation("not a table".into()))
        }
    }
}

#[async_trait]
impl Connector for MemoryDatabase {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Database
    }

    async fn ping(&self, connection: &ConnectionParams) -> Result<()> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(BridgeError::Connection(format!(
                "cannot reach {}",
                connection.host
            )));
        }
        Ok(())
    }

    async fn list_tables(&self, _connection: &ConnectionParams) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn fetch_schema(&self, source: &SourceDescriptor) -> Result<Vec<ColumnDescriptor>> {
        let table = table_of(source)?;
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|(cols, _)| cols.clone())
            .ok_or_else(|| BridgeError::NotFound(format!("table {} does not exist", table)))
    }

    fn read_batches(
        &self,
        source: &SourceDescriptor,
        opts: ReadOptions,
    ) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(opts.read_ahead.max(1));
        *self.last_read.lock().unwrap() = Some(opts.clone());

        let projected: Result<Vec<Row>> = table_of(source).and_then(|table| {
            let tables = self.tables.lock().unwrap();
            let (cols, rows) = tables
                .get(table)
                .ok_or_else(|| BridgeError::NotFound(format!("table {} does not exist", table)))?;
            let indices = opts
                .columns
                .iter()
                .map(|c| {
                    cols.iter()
                        .position(|d| &d.name == c)
                        .ok_or_else(|| BridgeError::Query(format!("unknown column {}", c)))
                })
                .collect::<Result<Vec<_>>>()?;
            let limit = opts.limit.unwrap_or(usize::MAX);
            let projected: Vec<Row> = rows
                .iter()
                .take(limit)
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect();
            Ok(projected)
        });
        let fail_at = self.fail_read_at_batch.load(Ordering::SeqCst);
        let batch_size = opts.batch_size.max(1);

        tokio::spawn(async move {
            let rows = match projected {
                Ok(rows) => rows,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            for (i, chunk) in rows.chunks(batch_size).enumerate() {
                let sequence = i + 1;
                if sequence == fail_at {
                    let _ = tx
                        .send(Err(BridgeError::Query(format!(
                            "injected read failure at batch {}",
                            sequence
                        ))))
                        .await;
                    return;
                }
                if tx.send(Ok(Batch::new(sequence, chunk.to_vec()))).await.is_err() {
                    return;
                }
            }
        });

        rx
    }

    async fn open_writer(
        &self,
        target: &TargetDescriptor,
        columns: &[ColumnDescriptor],
    ) -> Result<Box<dyn BatchWriter>> {
        let table = match target {
            TargetDescriptor::DatabaseTable { table, .. } => table.clone(),
            TargetDescriptor::FlatFile { .. } => {
                return Err(BridgeError::InvalidTarget("not a table".into()))
            }
        };
        self.tables
            .lock()
            .unwrap()
            .entry(table.clone())
            .or_insert_with(|| (columns.to_vec(), Vec::new()));

        Ok(Box::new(MemoryWriter {
            tables: self.tables.clone(),
            table,
            fail_at: self.fail_write_at_batch.load(Ordering::SeqCst),
            batches: 0,
        }))
    }
}

struct MemoryWriter {
    tables: Tables,
    table: String,
    fail_at: usize,
    batches: usize,
}

#[async_trait]
impl BatchWriter for MemoryWriter {
    async fn write_batch(&mut self, batch: &Batch) -> Result<u64> {
        self.batches += 1;
        if self.batches == self.fail_at {
            return Err(BridgeError::conversion("age", "abc", "Int64"));
        }
        let mut tables = self.tables.lock().unwrap();
        let entry = tables
            .get_mut(&self.table)
            .ok_or_else(|| BridgeError::NotFound(self.table.clone()))?;
        entry.1.extend(batch.rows.iter().cloned());
        Ok(batch.len() as u64)
    }

    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A workflow over a memory database and a real flat-file connector.
pub struct Fixture {
    pub dir: TempDir,
    pub db: Arc<MemoryDatabase>,
    pub registry: Arc<UploadRegistry>,
    pub workflow: Workflow,
}

impl Fixture {
    pub fn new(batch_size: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let db = MemoryDatabase::new();
        let registry = Arc::new(UploadRegistry::new(dir.path().join("uploads")));
        let flat_file = FlatFileConnector::new(registry.clone(), dir.path().join("output"), 100);
        let catalog = ConnectorCatalog::new(db.clone(), Arc::new(flat_file));
        let settings = TransferSettings {
            batch_size: Some(batch_size),
            ..Default::default()
        };
        let workflow = Workflow::new(catalog, registry.clone(), settings);
        Self {
            dir,
            db,
            registry,
            workflow,
        }
    }

    pub fn output_path(&self, filename: &str) -> std::path::PathBuf {
        self.dir.path().join("output").join(filename)
    }
}

pub fn connection() -> ConnectionParams {
    ConnectionParams {
        host: "memory".to_string(),
        port: 8123,
        database: "shop".to_string(),
        user: "default".to_string(),
        credential: None,
        secure: false,
    }
}

/// `orders(id Int64, amount Float64, note String)` with `n` rows.
pub fn orders(n: usize) -> (Vec<ColumnDescriptor>, Vec<Row>) {
    let columns = vec![
        ColumnDescriptor::new("id", "Int64"),
        ColumnDescriptor::new("amount", "Float64"),
        ColumnDescriptor::new("note", "Nullable(String)"),
    ];
    let rows = (1..=n)
        .map(|i| {
            vec![
                Value::Int(i as i64),
                Value::Float(i as f64 * 1.5),
                if i % 3 == 0 {
                    Value::Null
                } else {
                    Value::Text(format!("note {}", i))
                },
            ]
        })
        .collect();
    (columns, rows)
}

pub fn file_target(filename: &str) -> TargetDescriptor {
    TargetDescriptor::FlatFile {
        filename: filename.to_string(),
        delimiter: b',',
    }
}

pub fn table_target(table: &str) -> TargetDescriptor {
    TargetDescriptor::DatabaseTable {
        connection: connection(),
        table: table.to_string(),
    }
}
