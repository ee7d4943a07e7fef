//! Workflow states and the per-session configuration value.

use serde::Serialize;
use std::fmt;

use crate::core::{ColumnDescriptor, ConnectionParams, EndpointKind, SourceDescriptor};
use crate::join::JoinSpec;
use crate::selection::ColumnSelection;
use crate::transfer::TransferResult;

/// Where the configuration workflow stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    /// Connecting to the database or storing an upload.
    SourceConnecting,
    SourceReady,
    SchemaLoaded,
    ConfiguringTarget,
    /// A preview is running.
    Previewing,
    /// A transfer is running.
    Transferring,
    Complete,
    Failed,
}

impl WorkflowState {
    /// Pending states only exist while an operation is awaited.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            WorkflowState::SourceConnecting | WorkflowState::Previewing | WorkflowState::Transferring
        )
    }

    /// States in which a schema is loaded and the columns can be configured.
    pub(crate) fn has_schema(self) -> bool {
        matches!(
            self,
            WorkflowState::SchemaLoaded
                | WorkflowState::ConfiguringTarget
                | WorkflowState::Complete
                | WorkflowState::Failed
        )
    }

    /// States with a committed source.
    pub(crate) fn has_source(self) -> bool {
        self == WorkflowState::SourceReady || self.has_schema()
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::SourceConnecting => "connecting to the source",
            WorkflowState::SourceReady => "ready for schema discovery",
            WorkflowState::SchemaLoaded => "schema loaded",
            WorkflowState::ConfiguringTarget => "configuring the target",
            WorkflowState::Previewing => "previewing",
            WorkflowState::Transferring => "transferring",
            WorkflowState::Complete => "complete",
            WorkflowState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Everything configured since the last source change.
///
/// Replacing the whole value is the only way to reset, so no field can
/// outlive the source it was derived from.
#[derive(Debug, Clone)]
pub struct Session {
    pub source_kind: EndpointKind,
    /// Database connection (database sources, after connect).
    pub connection: Option<ConnectionParams>,
    /// Tables listed at connect time.
    pub tables: Vec<String>,
    pub source: Option<SourceDescriptor>,
    pub schema: Vec<ColumnDescriptor>,
    pub selection: Option<ColumnSelection>,
    pub join: Option<JoinSpec>,
    pub result: Option<TransferResult>,
}

impl Session {
    pub fn new(source_kind: EndpointKind) -> Self {
        Self {
            source_kind,
            connection: None,
            tables: Vec::new(),
            source: None,
            schema: Vec::new(),
            selection: None,
            join: None,
            result: None,
        }
    }

    /// Drop everything derived from the schema.
    pub(crate) fn clear_configuration(&mut self) {
        self.selection = None;
        self.join = None;
        self.result = None;
    }
}
