//! Workflow controller: the state machine driving a configuration session.
//!
//! ```text
//! Idle --connect/upload--> SourceConnecting --ok--> SourceReady
//!                                           --err-> Idle
//! SourceReady --fetch_schema--> SchemaLoaded
//! SchemaLoaded --select_columns / configure_join--> ConfiguringTarget
//! ConfiguringTarget --preview--> Previewing --> ConfiguringTarget
//! ConfiguringTarget --start_transfer--> Transferring --> Complete | Failed
//! ```
//!
//! A source change (kind switch, reconnect, new upload) replaces the whole
//! [`Session`], so selection, join and result can never refer to an old source.
//! Every state change is published on a `watch` channel; see
//! [`Workflow::subscribe`].

mod state;

pub use state::{Session, WorkflowState};

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::TransferSettings;
use crate::core::identifier::validate_identifier;
use crate::core::{
    ColumnDescriptor, ConnectionParams, ConnectorCatalog, EndpointKind, FileHandle,
    SourceDescriptor, TargetDescriptor,
};
use crate::error::{BridgeError, Result};
use crate::flatfile::UploadRegistry;
use crate::join::{build_join, JoinSpec};
use crate::preview::{self, Preview};
use crate::selection::{validate_selection, ColumnSelection};
use crate::transfer::{TransferConfig, TransferEngine, TransferJob, TransferProgress, TransferResult};

/// Drives one configuration session from source selection to transfer.
pub struct Workflow {
    catalog: ConnectorCatalog,
    registry: Arc<UploadRegistry>,
    settings: TransferSettings,
    state: WorkflowState,
    session: Session,
    state_tx: watch::Sender<WorkflowState>,
    progress_tx: Option<mpsc::Sender<TransferProgress>>,
}

impl Workflow {
    /// Create a workflow in `Idle`, expecting a database source.
    pub fn new(
        catalog: ConnectorCatalog,
        registry: Arc<UploadRegistry>,
        settings: TransferSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(WorkflowState::Idle);
        Self {
            catalog,
            registry,
            settings,
            state: WorkflowState::Idle,
            session: Session::new(EndpointKind::Database),
            state_tx,
            progress_tx: None,
        }
    }

    /// Forward transfer progress to `tx`.
    pub fn with_progress(mut self, tx: mpsc::Sender<TransferProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Watch state changes, including the pending states.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn source_kind(&self) -> EndpointKind {
        self.session.source_kind
    }

    pub fn source(&self) -> Option<&SourceDescriptor> {
        self.session.source.as_ref()
    }

    pub fn schema(&self) -> &[ColumnDescriptor] {
        &self.session.schema
    }

    pub fn selection(&self) -> Option<&ColumnSelection> {
        self.session.selection.as_ref()
    }

    pub fn join(&self) -> Option<&JoinSpec> {
        self.session.join.as_ref()
    }

    pub fn last_result(&self) -> Option<&TransferResult> {
        self.session.result.as_ref()
    }

    fn set_state(&mut self, state: WorkflowState) {
        if self.state != state {
            debug!("Workflow state: {} -> {}", self.state, state);
        }
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn reset(&mut self, kind: EndpointKind) {
        let previous = std::mem::replace(&mut self.session, Session::new(kind));
        if let Some(SourceDescriptor::FlatFile { file, .. }) = previous.source {
            self.registry.forget(&file);
        }
        self.set_state(WorkflowState::Idle);
    }

    fn require(&self, operation: &'static str, allowed: bool) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(BridgeError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Choose which kind of source to configure.
    ///
    /// An unchanged kind is a no-op; a different kind discards the session.
    pub fn select_source_kind(&mut self, kind: EndpointKind) {
        if kind == self.session.source_kind {
            return;
        }
        info!("Switching source kind to {}", kind);
        self.reset(kind);
    }

    /// Connect to a database source, replacing any previous source.
    ///
    /// Tests the connection and lists its tables. On failure the workflow
    /// settles in `Idle` with an empty session.
    pub async fn connect(&mut self, connection: ConnectionParams) -> Result<Vec<String>> {
        self.reset(EndpointKind::Database);
        self.set_state(WorkflowState::SourceConnecting);

        let connector = self.catalog.for_kind(EndpointKind::Database);
        let outcome = match connector.ping(&connection).await {
            Ok(()) => connector.list_tables(&connection).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(tables) => {
                info!(
                    "Database source ready: {} ({} tables)",
                    connection.label(),
                    tables.len()
                );
                self.session.connection = Some(connection);
                self.session.tables = tables.clone();
                self.set_state(WorkflowState::SourceReady);
                Ok(tables)
            }
            Err(e) => {
                warn!("Connection to {} failed: {}", connection.label(), e);
                self.set_state(WorkflowState::Idle);
                Err(e)
            }
        }
    }

    /// Store uploaded bytes as the flat-file source, replacing any previous source.
    pub async fn upload(
        &mut self,
        bytes: &[u8],
        original_name: &str,
        delimiter: u8,
        has_header: bool,
    ) -> Result<FileHandle> {
        self.reset(EndpointKind::FlatFile);
        self.set_state(WorkflowState::SourceConnecting);

        match self.registry.upload(bytes, original_name).await {
            Ok(file) => Ok(self.file_ready(file, delimiter, has_header)),
            Err(e) => {
                self.set_state(WorkflowState::Idle);
                Err(e)
            }
        }
    }

    /// Use an existing local file as the flat-file source.
    pub fn register_file(
        &mut self,
        path: impl AsRef<Path>,
        delimiter: u8,
        has_header: bool,
    ) -> Result<FileHandle> {
        self.reset(EndpointKind::FlatFile);
        self.set_state(WorkflowState::SourceConnecting);

        match self.registry.register(path) {
            Ok(file) => Ok(self.file_ready(file, delimiter, has_header)),
            Err(e) => {
                self.set_state(WorkflowState::Idle);
                Err(e)
            }
        }
    }

    fn file_ready(&mut self, file: FileHandle, delimiter: u8, has_header: bool) -> FileHandle {
        info!("Flat-file source ready: {}", file);
        self.session.source = Some(SourceDescriptor::FlatFile {
            file: file.clone(),
            delimiter,
            has_header,
        });
        self.set_state(WorkflowState::SourceReady);
        file
    }

    /// Re-list the tables of the connected database.
    pub async fn list_tables(&mut self) -> Result<Vec<String>> {
        self.require("list tables", self.state.has_source())?;
        let connection = self.session.connection.clone().ok_or_else(|| {
            BridgeError::UnsupportedOperation("only database sources have tables".into())
        })?;

        let tables = self
            .catalog
            .for_kind(EndpointKind::Database)
            .list_tables(&connection)
            .await?;
        self.session.tables = tables.clone();
        Ok(tables)
    }

    /// Discover the schema of the source.
    ///
    /// Database sources name the table here (or reuse the current one); flat
    /// files take `None`. Success clears selection, join and result.
    pub async fn fetch_schema(&mut self, table: Option<&str>) -> Result<Vec<ColumnDescriptor>> {
        self.require("fetch the schema", self.state.has_source())?;

        let source = match (self.session.source_kind, table) {
            (EndpointKind::Database, table) => {
                let connection = self.session.connection.clone().ok_or_else(|| {
                    BridgeError::Connection("no database connection".into())
                })?;
                let table = match (table, &self.session.source) {
                    (Some(t), _) => t.trim().to_string(),
                    (None, Some(SourceDescriptor::DatabaseTable { table, .. })) => table.clone(),
                    (None, _) => {
                        return Err(BridgeError::NotFound(
                            "no table chosen for the database source".into(),
                        ));
                    }
                };
                validate_identifier(&table)?;
                SourceDescriptor::DatabaseTable { connection, table }
            }
            (EndpointKind::FlatFile, Some(_)) => {
                return Err(BridgeError::UnsupportedOperation(
                    "flat-file sources have no tables".into(),
                ));
            }
            (EndpointKind::FlatFile, None) => self.session.source.clone().ok_or_else(|| {
                BridgeError::NotFound("no file has been uploaded".into())
            })?,
        };

        let columns = self
            .catalog
            .for_kind(source.kind())
            .fetch_schema(&source)
            .await?;

        info!(
            "Loaded schema of {}: {} columns",
            source.label(),
            columns.len()
        );
        self.session.source = Some(source);
        self.session.schema = columns.clone();
        self.session.clear_configuration();
        self.set_state(WorkflowState::SchemaLoaded);
        Ok(columns)
    }

    /// Choose the columns to preview and transfer.
    pub fn select_columns<S: AsRef<str>>(&mut self, chosen: &[S]) -> Result<&ColumnSelection> {
        self.require("select columns", self.state.has_schema())?;
        let selection = validate_selection(&self.session.schema, chosen)?;
        debug!("Selected columns: {:?}", selection.columns());
        self.set_state(WorkflowState::ConfiguringTarget);
        Ok(self.session.selection.insert(selection))
    }

    /// Choose every column of the schema.
    pub fn select_all(&mut self) -> Result<&ColumnSelection> {
        let names: Vec<String> = self.session.schema.iter().map(|c| c.name.clone()).collect();
        self.select_columns(&names)
    }

    /// Join the database source against an auxiliary table.
    ///
    /// On failure nothing changes, including the state.
    pub fn configure_join(&mut self, auxiliary_table: &str, predicate: &str) -> Result<&JoinSpec> {
        self.require("configure a join", self.state.has_schema())?;
        let source = self
            .session
            .source
            .as_ref()
            .ok_or_else(|| BridgeError::NotFound("no source".into()))?;
        let join = build_join(source, auxiliary_table, predicate)?;
        info!(
            "Join configured: {} ON {}",
            join.auxiliary_table, join.predicate
        );
        self.settle_configuration();
        Ok(self.session.join.insert(join))
    }

    /// Remove the join, if any.
    pub fn clear_join(&mut self) -> Result<()> {
        self.require("clear the join", self.state.has_schema())?;
        self.session.join = None;
        self.settle_configuration();
        Ok(())
    }

    fn settle_configuration(&mut self) {
        let next = if self.session.selection.is_some() {
            WorkflowState::ConfiguringTarget
        } else {
            WorkflowState::SchemaLoaded
        };
        self.set_state(next);
    }

    /// Fetch a bounded sample of the selected columns.
    pub async fn preview(&mut self) -> Result<Preview> {
        let selection = self
            .session
            .selection
            .clone()
            .ok_or(BridgeError::EmptySelection)?;
        self.require(
            "preview",
            matches!(
                self.state,
                WorkflowState::ConfiguringTarget | WorkflowState::Complete | WorkflowState::Failed
            ),
        )?;
        let source = self
            .session
            .source
            .clone()
            .ok_or_else(|| BridgeError::NotFound("no source".into()))?;

        let before = self.state;
        self.set_state(WorkflowState::Previewing);
        let connector = self.catalog.for_kind(source.kind());
        let outcome = preview::preview(
            &*connector,
            &source,
            &selection,
            self.session.join.as_ref(),
            self.settings.get_preview_rows(),
        )
        .await;

        match outcome {
            Ok(preview) => {
                self.set_state(WorkflowState::ConfiguringTarget);
                Ok(preview)
            }
            Err(e) => {
                self.set_state(before);
                Err(e)
            }
        }
    }

    /// Run the full transfer to `target`.
    ///
    /// Precondition failures (no selection, wrong target kind) return `Err`
    /// and leave the state alone. Once the transfer starts the outcome is the
    /// returned [`TransferResult`], and the state becomes `Complete` or `Failed`.
    pub async fn start_transfer(&mut self, target: TargetDescriptor) -> Result<TransferResult> {
        let selection = self
            .session
            .selection
            .clone()
            .ok_or(BridgeError::EmptySelection)?;
        self.require(
            "start a transfer",
            matches!(
                self.state,
                WorkflowState::ConfiguringTarget | WorkflowState::Complete | WorkflowState::Failed
            ),
        )?;
        let source = self
            .session
            .source
            .clone()
            .ok_or_else(|| BridgeError::NotFound("no source".into()))?;

        let job = TransferJob {
            columns: selection.descriptors(&self.session.schema),
            join: self.session.join.clone(),
            source,
            target,
        };
        crate::transfer::check_job(&job)?;

        self.session.result = None;
        self.set_state(WorkflowState::Transferring);

        let mut engine = TransferEngine::new(
            self.catalog.clone(),
            TransferConfig::from(&self.settings),
        );
        if let Some(tx) = &self.progress_tx {
            engine = engine.with_progress(tx.clone());
        }
        let result = engine.execute(job).await;

        self.set_state(if result.success {
            WorkflowState::Complete
        } else {
            WorkflowState::Failed
        });
        self.session.result = Some(result.clone());
        Ok(result)
    }
}
