//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{BridgeError, Result};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Err(BridgeError::Config("configuration file is empty".into()));
        }
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// The database section, required by commands that talk to ClickHouse.
    pub fn require_clickhouse(&self) -> Result<&ClickHouseConfig> {
        self.clickhouse.as_ref().ok_or_else(|| {
            BridgeError::Config("clickhouse section is required for this command".into())
        })
    }
}
