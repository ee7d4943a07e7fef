//! Connector catalog for explicit dependency injection.
//!
//! The workflow never constructs connectors itself. It receives a
//! [`ConnectorCatalog`] holding one connector per endpoint kind, which keeps the
//! orchestration testable with in-memory doubles.

use std::sync::Arc;

use crate::clickhouse::ClickHouseConnector;
use crate::config::Config;
use crate::error::Result;
use crate::flatfile::{FlatFileConnector, UploadRegistry};

use super::schema::EndpointKind;
use super::traits::Connector;

/// One connector per endpoint kind.
#[derive(Clone)]
pub struct ConnectorCatalog {
    database: Arc<dyn Connector>,
    flat_file: Arc<dyn Connector>,
}

impl ConnectorCatalog {
    /// Build a catalog from explicit connectors.
    pub fn new(database: Arc<dyn Connector>, flat_file: Arc<dyn Connector>) -> Self {
        Self {
            database,
            flat_file,
        }
    }

    /// Build the standard catalog: ClickHouse over HTTP plus the flat-file
    /// connector rooted at the configured directories.
    ///
    /// Returns the upload registry too, since callers need it to register files.
    pub fn from_config(config: &Config) -> Result<(Self, Arc<UploadRegistry>)> {
        let registry = Arc::new(UploadRegistry::new(&config.files.upload_dir));
        let database = ClickHouseConnector::new(config.clickhouse_timeout())?;
        let flat_file = FlatFileConnector::new(
            registry.clone(),
            &config.files.output_dir,
            config.transfer.get_schema_sample_rows(),
        );
        Ok((Self::new(Arc::new(database), Arc::new(flat_file)), registry))
    }

    /// Connector serving the given kind.
    pub fn for_kind(&self, kind: EndpointKind) -> Arc<dyn Connector> {
        match kind {
            EndpointKind::Database => self.database.clone(),
            EndpointKind::FlatFile => self.flat_file.clone(),
        }
    }
}
