//! Core abstractions shared by the workflow and the connectors.
//!
//! - [`schema`]: source/target/column descriptors
//! - [`value`]: cell values and batches
//! - [`traits`]: the [`Connector`] capability and its batch writer
//! - [`catalog`]: connector selection by endpoint kind
//! - [`identifier`]: identifier quoting for generated SQL
//!
//! Nothing in here knows about ClickHouse or the `csv` crate; the concrete
//! connectors live in [`crate::clickhouse`] and [`crate::flatfile`].

pub mod catalog;
pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use catalog::ConnectorCatalog;
pub use schema::{
    ColumnDescriptor, ConnectionParams, Credential, EndpointKind, FileHandle, SourceDescriptor,
    TargetDescriptor,
};
pub use traits::{BatchWriter, Connector, ReadOptions};
pub use value::{Batch, Row, Value};
