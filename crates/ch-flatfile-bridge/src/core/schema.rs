//! Source, target and column descriptors.
//!
//! Descriptors are plain values: the workflow replaces them wholesale instead of
//! mutating them, so a source change can never leave half-updated state behind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the bridge an endpoint lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// A ClickHouse table.
    Database,
    /// A delimited flat file.
    FlatFile,
}

impl EndpointKind {
    /// The kind a transfer from this kind must write to.
    pub fn complement(self) -> Self {
        match self {
            EndpointKind::Database => EndpointKind::FlatFile,
            EndpointKind::FlatFile => EndpointKind::Database,
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::Database => write!(f, "database"),
            EndpointKind::FlatFile => write!(f, "flat file"),
        }
    }
}

/// Opaque database credential.
///
/// The secret is only ever handed to the HTTP layer; `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Password sent as `X-ClickHouse-Key`.
    Password(String),
    /// JWT sent as a bearer token.
    Jwt(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => write!(f, "Password([REDACTED])"),
            Credential::Jwt(_) => write!(f, "Jwt([REDACTED])"),
        }
    }
}

/// Everything needed to reach a ClickHouse database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub credential: Option<Credential>,
    /// Use HTTPS instead of HTTP.
    pub secure: bool,
}

impl ConnectionParams {
    /// Base URL of the HTTP interface.
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.host, self.port)
    }

    /// Short label for log lines (never includes the credential).
    pub fn label(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

/// Server-assigned reference to a registered flat file.
///
/// Handles are capabilities: they resolve only through the upload registry and
/// are never interpreted as user-controlled paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHandle(String);

impl FileHandle {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The opaque identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where rows are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// A table in a ClickHouse database.
    DatabaseTable {
        connection: ConnectionParams,
        table: String,
    },
    /// A registered delimited file.
    FlatFile {
        file: FileHandle,
        delimiter: u8,
        has_header: bool,
    },
}

impl SourceDescriptor {
    pub fn kind(&self) -> EndpointKind {
        match self {
            SourceDescriptor::DatabaseTable { .. } => EndpointKind::Database,
            SourceDescriptor::FlatFile { .. } => EndpointKind::FlatFile,
        }
    }

    /// Table name or file handle, for log lines and messages.
    pub fn label(&self) -> String {
        match self {
            SourceDescriptor::DatabaseTable { connection, table } => {
                format!("{}.{}", connection.database, table)
            }
            SourceDescriptor::FlatFile { file, .. } => file.to_string(),
        }
    }
}

/// Where rows are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetDescriptor {
    /// A ClickHouse table, created if missing.
    DatabaseTable {
        connection: ConnectionParams,
        table: String,
    },
    /// An output file inside the configured output directory.
    FlatFile { filename: String, delimiter: u8 },
}

impl TargetDescriptor {
    pub fn kind(&self) -> EndpointKind {
        match self {
            TargetDescriptor::DatabaseTable { .. } => EndpointKind::Database,
            TargetDescriptor::FlatFile { .. } => EndpointKind::FlatFile,
        }
    }

    /// Output file name or table name, as reported in a transfer result.
    pub fn label(&self) -> &str {
        match self {
            TargetDescriptor::DatabaseTable { table, .. } => table,
            TargetDescriptor::FlatFile { filename, .. } => filename,
        }
    }
}

/// A column as reported by a schema provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Type name (ClickHouse type syntax).
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams {
            host: "ch.local".to_string(),
            port: 8123,
            database: "analytics".to_string(),
            user: "default".to_string(),
            credential: Some(Credential::Jwt("eyJsecret".to_string())),
            secure: false,
        }
    }

    #[test]
    fn test_complement_kind() {
        assert_eq!(EndpointKind::Database.complement(), EndpointKind::FlatFile);
        assert_eq!(EndpointKind::FlatFile.complement(), EndpointKind::Database);
    }

    #[test]
    fn test_credential_debug_redacted() {
        let debug = format!("{:?}", params());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("eyJsecret"));
    }

    #[test]
    fn test_base_url_scheme() {
        let mut p = params();
        assert_eq!(p.base_url(), "http://ch.local:8123/");
        p.secure = true;
        p.port = 8443;
        assert_eq!(p.base_url(), "https://ch.local:8443/");
    }

    #[test]
    fn test_descriptor_labels() {
        let source = SourceDescriptor::DatabaseTable {
            connection: params(),
            table: "orders".to_string(),
        };
        assert_eq!(source.kind(), EndpointKind::Database);
        assert_eq!(source.label(), "analytics.orders");

        let target = TargetDescriptor::FlatFile {
            filename: "orders.csv".to_string(),
            delimiter: b',',
        };
        assert_eq!(target.kind(), EndpointKind::FlatFile);
        assert_eq!(target.label(), "orders.csv");
    }

    #[test]
    fn test_column_descriptor_serializes_type_field() {
        let col = ColumnDescriptor::new("id", "UInt64");
        let json = serde_json::to_string(&col).unwrap();
        assert_eq!(json, r#"{"name":"id","type":"UInt64"}"#);
    }
}
