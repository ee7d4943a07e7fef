//! # ch-flatfile-bridge
//!
//! Bulk transfers between ClickHouse tables and delimited flat files.
//!
//! A [`Workflow`] walks one configuration session through its steps:
//!
//! - **Source**: connect to a database or upload a file
//! - **Schema**: discover the ordered column list
//! - **Selection**: choose a non-empty subset of columns, optionally joining a
//!   second database table
//! - **Preview**: fetch a bounded sample
//! - **Transfer**: stream every row to the complementary target in batches
//!
//! ## Example
//!
//! ```rust,no_run
//! use ch_flatfile_bridge::{Config, ConnectorCatalog, TargetDescriptor, Workflow};
//!
//! #[tokio::main]
//! async fn main() -> ch_flatfile_bridge::Result<()> {
//!     let config = Config::load("config.yaml")?.with_auto_tuning();
//!     let (catalog, registry) = ConnectorCatalog::from_config(&config)?;
//!     let mut workflow = Workflow::new(catalog, registry, config.transfer.clone());
//!
//!     workflow.connect(config.require_clickhouse()?.connection_params()).await?;
//!     workflow.fetch_schema(Some("orders")).await?;
//!     workflow.select_columns(&["id", "amount"])?;
//!     let result = workflow
//!         .start_transfer(TargetDescriptor::FlatFile {
//!             filename: "orders.csv".to_string(),
//!             delimiter: b',',
//!         })
//!         .await?;
//!     println!("Transferred {:?} rows", result.row_count);
//!     Ok(())
//! }
//! ```

pub mod clickhouse;
pub mod config;
pub mod core;
pub mod error;
pub mod flatfile;
pub mod join;
pub mod preview;
pub mod selection;
pub mod transfer;
pub mod workflow;

// Re-exports for convenient access
pub use clickhouse::ClickHouseConnector;
pub use config::{ClickHouseConfig, Config, FilesConfig, TransferSettings};
pub use crate::core::{
    Batch, BatchWriter, ColumnDescriptor, ConnectionParams, Connector, ConnectorCatalog,
    Credential, EndpointKind, FileHandle, ReadOptions, Row, SourceDescriptor, TargetDescriptor,
    Value,
};
pub use error::{BridgeError, Result};
pub use flatfile::{parse_delimiter, FlatFileConnector, UploadRegistry};
pub use join::{build_join, JoinSpec};
pub use preview::Preview;
pub use selection::{validate_selection, ColumnSelection};
pub use transfer::{TransferConfig, TransferEngine, TransferJob, TransferProgress, TransferResult};
pub use workflow::{Session, Workflow, WorkflowState};
