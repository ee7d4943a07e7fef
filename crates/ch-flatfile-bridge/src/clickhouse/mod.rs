//! ClickHouse connector over the HTTP interface.
//!
//! Every operation is one POST to the server's base URL:
//! - the target database goes in the `database` query parameter
//! - the user goes in `X-ClickHouse-User`
//! - a password goes in `X-ClickHouse-Key`, a JWT in `Authorization: Bearer`
//!
//! Reads use `FORMAT JSONCompactEachRow` and stream the body line by line, so a
//! large export never sits in memory. Each insert batch is its own request.
//!
//! The configured timeout bounds connecting and every short request (catalog
//! queries, DDL, inserts). Streaming reads have no overall deadline.

pub mod convert;
pub mod dialect;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, Response};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tracing::{debug, info};

use crate::core::identifier::validate_identifier;
use crate::core::{
    Batch, BatchWriter, ColumnDescriptor, ConnectionParams, Connector, Credential, EndpointKind,
    ReadOptions, Row, SourceDescriptor, TargetDescriptor, Value,
};
use crate::error::{BridgeError, Result};

use convert::{encode_row, ColumnType};

/// Database connector backed by one shared HTTP client.
#[derive(Clone)]
pub struct ClickHouseConnector {
    client: Client,
    timeout: Duration,
}

impl ClickHouseConnector {
    /// Create a connector that gives up connecting, and finishing short
    /// requests, after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    /// Columns of a table in native order.
    pub async fn describe_table(
        &self,
        conn: &ConnectionParams,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>> {
        let rows = self
            .query_rows(conn, dialect::describe_query(&conn.database, table)?)
            .await?;

        rows.into_iter()
            .map(|row| match (row.first(), row.get(1)) {
                (Some(serde_json::Value::String(name)), Some(serde_json::Value::String(ty))) => {
                    Ok(ColumnDescriptor::new(name.as_str(), ty.as_str()))
                }
                _ => Err(BridgeError::Parse(format!(
                    "unexpected DESCRIBE row for table '{}'",
                    table
                ))),
            })
            .collect()
    }

    pub async fn table_exists(&self, conn: &ConnectionParams, table: &str) -> Result<bool> {
        let rows = self
            .query_rows(conn, dialect::exists_query(&conn.database, table)?)
            .await?;
        let flag = rows
            .first()
            .and_then(|row| row.first())
            .map(|cell| cell.as_u64() == Some(1) || cell.as_str() == Some("1"))
            .unwrap_or(false);
        Ok(flag)
    }

    /// Create a MergeTree table for the given columns if it does not exist.
    pub async fn create_table(
        &self,
        conn: &ConnectionParams,
        table: &str,
        columns: &[ColumnDescriptor],
    ) -> Result<()> {
        let sql = dialect::create_table_query(&conn.database, table, columns)?;
        debug!("Creating table: {}", sql);
        self.execute(conn, sql).await?;
        Ok(())
    }

    /// Insert rows in one request. `columns` are the target's own descriptors.
    ///
    /// Returns the number of rows sent. Conversion failures abort before any
    /// byte reaches the server.
    pub async fn insert_batch(
        &self,
        conn: &ConnectionParams,
        table: &str,
        columns: &[ColumnDescriptor],
        rows: &[Row],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let types: Vec<ColumnType> = columns.iter().map(ColumnType::from_descriptor).collect();
        let mut body = String::new();
        for row in rows {
            body.push_str(&encode_row(row, &types)?);
            body.push('\n');
        }

        let sql = dialect::insert_query(&conn.database, table, columns)?;
        self.execute_with_query_param(conn, sql, body).await?;
        Ok(rows.len() as u64)
    }

    fn request(&self, conn: &ConnectionParams) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(conn.base_url())
            .query(&[("database", conn.database.as_str())])
            .header("X-ClickHouse-User", &conn.user);

        match &conn.credential {
            Some(Credential::Password(password)) => {
                req = req.header("X-ClickHouse-Key", password);
            }
            Some(Credential::Jwt(token)) => {
                req = req.bearer_auth(token);
            }
            None => {}
        }
        req
    }

    /// Send a statement as the request body, bounded by the request timeout.
    async fn execute(&self, conn: &ConnectionParams, sql: String) -> Result<Response> {
        let response = self
            .request(conn)
            .timeout(self.timeout)
            .body(sql)
            .send()
            .await?;
        check_status(response).await
    }

    /// Send a statement whose response is streamed for as long as it takes.
    async fn execute_streaming(&self, conn: &ConnectionParams, sql: String) -> Result<Response> {
        let response = self.request(conn).body(sql).send().await?;
        check_status(response).await
    }

    /// Send a statement in the `query` parameter with `data` as the body.
    async fn execute_with_query_param(
        &self,
        conn: &ConnectionParams,
        sql: String,
        data: String,
    ) -> Result<Response> {
        let response = self
            .request(conn)
            .timeout(self.timeout)
            .query(&[("query", sql.as_str())])
            .body(data)
            .send()
            .await?;
        check_status(response).await
    }

    /// Run a small query and collect its rows.
    async fn query_rows(
        &self,
        conn: &ConnectionParams,
        sql: String,
    ) -> Result<Vec<Vec<serde_json::Value>>> {
        let response = self.execute(conn, sql).await?;
        let text = response.text().await?;
        let mut rows = Vec::new();
        for line in text.lines() {
            if let Some(row) = parse_line(line)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    async fn read_impl(
        &self,
        source: SourceDescriptor,
        opts: ReadOptions,
        tx: mpsc::Sender<Result<Batch>>,
    ) -> Result<()> {
        let (conn, table) = database_source(&source)?;
        let sql = dialect::select_query(
            &conn.database,
            table,
            &opts.columns,
            opts.join.as_ref(),
            opts.limit,
        )?;
        debug!("Reading {}: {}", source.label(), sql);

        let response = self.execute_streaming(conn, sql).await?;
        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let mut lines = StreamReader::new(stream).lines();

        let batch_size = opts.batch_size.max(1);
        let mut rows: Vec<Row> = Vec::with_capacity(batch_size);
        let mut sequence = 0;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| BridgeError::Connection(format!("result stream interrupted: {}", e)))?
        {
            let Some(cells) = parse_line(&line)? else {
                continue;
            };
            rows.push(cells.into_iter().map(Value::from_json).collect());

            if rows.len() >= batch_size {
                sequence += 1;
                let batch = Batch::new(sequence, std::mem::take(&mut rows));
                debug!("Read batch {} ({} rows) from {}", sequence, batch.len(), source.label());
                if tx.send(Ok(batch)).await.is_err() {
                    // Consumer went away.
                    return Ok(());
                }
            }
        }

        if !rows.is_empty() {
            sequence += 1;
            let _ = tx.send(Ok(Batch::new(sequence, rows))).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for ClickHouseConnector {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Database
    }

    /// Test the connection with `SELECT 1`.
    async fn ping(&self, conn: &ConnectionParams) -> Result<()> {
        self.query_rows(conn, dialect::ping_query()).await?;
        info!("Connected to ClickHouse: {}", conn.label());
        Ok(())
    }

    /// Table names of the connection's database.
    async fn list_tables(&self, conn: &ConnectionParams) -> Result<Vec<String>> {
        let rows = self
            .query_rows(conn, dialect::list_tables_query(&conn.database)?)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter_map(|cell| cell.as_str().map(str::to_string))
            .collect())
    }

    async fn fetch_schema(&self, source: &SourceDescriptor) -> Result<Vec<ColumnDescriptor>> {
        let (conn, table) = database_source(source)?;
        self.describe_table(conn, table).await
    }

    fn read_batches(
        &self,
        source: &SourceDescriptor,
        opts: ReadOptions,
    ) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(opts.read_ahead.max(1));
        let connector = self.clone();
        let source = source.clone();

        tokio::spawn(async move {
            let result = connector.read_impl(source, opts, tx.clone()).await;
            if let Err(e) = result {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    async fn open_writer(
        &self,
        target: &TargetDescriptor,
        columns: &[ColumnDescriptor],
    ) -> Result<Box<dyn BatchWriter>> {
        let (conn, table) = match target {
            TargetDescriptor::DatabaseTable { connection, table } => (connection, table),
            TargetDescriptor::FlatFile { .. } => {
                return Err(BridgeError::InvalidTarget(
                    "database connector cannot write flat files".into(),
                ));
            }
        };
        validate_identifier(table)
            .map_err(|e| BridgeError::InvalidTarget(format!("target table: {}", e)))?;

        if !self.table_exists(conn, table).await? {
            self.create_table(conn, table, columns).await?;
            info!("Created target table {}.{}", conn.database, table);
        }

        let existing = self.describe_table(conn, table).await?;
        let resolved = columns
            .iter()
            .map(|col| {
                existing
                    .iter()
                    .find(|e| e.name == col.name)
                    .cloned()
                    .ok_or_else(|| {
                        BridgeError::InvalidTarget(format!(
                            "column '{}' does not exist in target table '{}'",
                            col.name, table
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Box::new(ClickHouseWriter {
            connector: self.clone(),
            connection: conn.clone(),
            table: table.clone(),
            columns: resolved,
            rows_written: 0,
        }))
    }
}

/// Writer inserting one request per batch.
struct ClickHouseWriter {
    connector: ClickHouseConnector,
    connection: ConnectionParams,
    table: String,
    columns: Vec<ColumnDescriptor>,
    rows_written: u64,
}

#[async_trait]
impl BatchWriter for ClickHouseWriter {
    async fn write_batch(&mut self, batch: &Batch) -> Result<u64> {
        let n = self
            .connector
            .insert_batch(&self.connection, &self.table, &self.columns, &batch.rows)
            .await?;
        self.rows_written += n;
        debug!(
            "Inserted batch {} ({} rows) into {}",
            batch.sequence, n, self.table
        );
        Ok(n)
    }

    async fn finish(&mut self) -> Result<()> {
        info!(
            "Finished writing {} rows to {}.{}",
            self.rows_written, self.connection.database, self.table
        );
        Ok(())
    }
}

fn database_source(source: &SourceDescriptor) -> Result<(&ConnectionParams, &str)> {
    match source {
        SourceDescriptor::DatabaseTable { connection, table } => Ok((connection, table)),
        SourceDescriptor::FlatFile { .. } => Err(BridgeError::UnsupportedOperation(
            "database connector cannot read flat files".into(),
        )),
    }
}

/// Parse one `JSONCompactEachRow` line. Blank lines yield `None`.
///
/// The server reports errors raised mid-stream as plain text in the body, so a
/// non-JSON line carrying an exception code is classified like an HTTP error.
fn parse_line(line: &str) -> Result<Option<Vec<serde_json::Value>>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Vec<serde_json::Value>>(line) {
        Ok(cells) => Ok(Some(cells)),
        Err(_) if exception_code(line).is_some() => Err(classify_error(line)),
        Err(e) => Err(BridgeError::Parse(format!(
            "malformed result row: {} ({})",
            e, line
        ))),
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(BridgeError::Connection(format!(
            "authentication failed ({}): {}",
            status,
            body.trim()
        )));
    }
    Err(classify_error(&body))
}

/// Extract `N` from a ClickHouse `Code: N.` error prefix.
fn exception_code(message: &str) -> Option<u32> {
    let rest = &message[message.find("Code: ")? + "Code: ".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Map a server error message onto the error taxonomy.
fn classify_error(message: &str) -> BridgeError {
    let message = message.trim().to_string();
    match exception_code(&message) {
        // UNKNOWN_TABLE, UNKNOWN_DATABASE
        Some(60) | Some(81) => BridgeError::NotFound(message),
        // AUTHENTICATION_FAILED, REQUIRED_PASSWORD
        Some(516) | Some(194) => BridgeError::Connection(message),
        // SYNTAX_ERROR
        Some(62) => BridgeError::Query(format!("syntax error: {}", message)),
        _ => BridgeError::Query(message),
    }
}
