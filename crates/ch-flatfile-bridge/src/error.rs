//! Error types for the transfer library.

use thiserror::Error;

use crate::workflow::WorkflowState;

/// Main error type for bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error (invalid YAML values, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database could not be reached or refused the credentials.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A table or file reference does not resolve.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed structure while discovering a schema (bad header, duplicate names).
    #[error("Schema error: {0}")]
    Schema(String),

    /// Malformed data while reading rows.
    #[error("Parse error: {0}")]
    Parse(String),

    /// No columns were chosen.
    #[error("No columns selected: choose at least one column")]
    EmptySelection,

    /// A chosen column is not part of the loaded schema.
    #[error("Unknown column '{0}': not present in the loaded schema")]
    UnknownColumn(String),

    /// Join configuration is incomplete or inconsistent.
    #[error("Invalid join: {0}")]
    InvalidJoin(String),

    /// Operation does not apply to this kind of source.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Target descriptor is unusable for this source.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The database rejected or failed a query.
    #[error("Query failed: {0}")]
    Query(String),

    /// A value could not be converted to the target column type.
    #[error("Cannot convert value {value:?} in column '{column}' to {target_type}")]
    Conversion {
        column: String,
        value: String,
        target_type: String,
    },

    /// Workflow operation invoked from a state that does not allow it.
    #[error("Cannot {operation} while the workflow is {state}")]
    InvalidState {
        operation: &'static str,
        state: WorkflowState,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited file reader/writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Create a Conversion error.
    pub fn conversion(
        column: impl Into<String>,
        value: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        BridgeError::Conversion {
            column: column.into(),
            value: value.into(),
            target_type: target_type.into(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            BridgeError::Config(_) | BridgeError::Yaml(_) => 1,
            BridgeError::Connection(_) => 2,
            BridgeError::NotFound(_) => 3,
            BridgeError::Schema(_) | BridgeError::Parse(_) | BridgeError::Csv(_) => 4,
            BridgeError::EmptySelection
            | BridgeError::UnknownColumn(_)
            | BridgeError::InvalidJoin(_)
            | BridgeError::UnsupportedOperation(_)
            | BridgeError::InvalidTarget(_)
            | BridgeError::InvalidState { .. } => 5,
            BridgeError::Query(_) | BridgeError::Conversion { .. } => 6,
            BridgeError::Io(_) | BridgeError::Json(_) => 7,
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BridgeError::Parse(e.to_string())
        } else {
            BridgeError::Connection(e.to_string())
        }
    }
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(BridgeError::Config("x".into()).exit_code(), 1);
        assert_eq!(BridgeError::Connection("x".into()).exit_code(), 2);
        assert_eq!(BridgeError::EmptySelection.exit_code(), 5);
        assert_eq!(
            BridgeError::conversion("age", "abc", "Int64").exit_code(),
            6
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(BridgeError::Io(io).exit_code(), 7);
    }

    #[test]
    fn test_conversion_message_names_column() {
        let err = BridgeError::conversion("age", "abc", "Int64");
        let msg = err.to_string();
        assert!(msg.contains("age"));
        assert!(msg.contains("Int64"));
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = BridgeError::Io(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: disk full"));
    }
}
