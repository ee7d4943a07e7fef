//! Configuration type definitions with auto-tuning based on system resources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use sysinfo::System;
use tracing::info;

use crate::core::{ConnectionParams, Credential};

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in bytes.
    pub total_memory_bytes: u64,
    /// Total RAM in GB.
    pub total_memory_gb: f64,
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        let total_memory_bytes = sys.total_memory();
        let total_memory_gb = total_memory_bytes as f64 / (1024.0 * 1024.0 * 1024.0);
        let cpu_cores = sys.cpus().len();

        Self {
            total_memory_bytes,
            total_memory_gb,
            cpu_cores,
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            self.total_memory_gb, self.cpu_cores
        );
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// ClickHouse connection. Only required by commands that touch the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clickhouse: Option<ClickHouseConfig>,

    /// Upload and output directories.
    #[serde(default)]
    pub files: FilesConfig,

    /// Transfer behavior.
    #[serde(default)]
    pub transfer: TransferSettings,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.transfer = self.transfer.with_auto_tuning(&resources);
        self
    }

    /// HTTP timeout for database requests.
    pub fn clickhouse_timeout(&self) -> Duration {
        let secs = self
            .clickhouse
            .as_ref()
            .map(|c| c.timeout_seconds)
            .unwrap_or_else(default_timeout_seconds);
        Duration::from_secs(secs)
    }
}

/// ClickHouse HTTP interface configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// Server host.
    pub host: String,

    /// HTTP port (default: 8123).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name (default: "default").
    #[serde(default = "default_name")]
    pub database: String,

    /// Username (default: "default").
    #[serde(default = "default_name")]
    pub user: String,

    /// Password, sent as `X-ClickHouse-Key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// JWT, sent as a bearer token. Mutually exclusive with `password`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_token: Option<String>,

    /// Use HTTPS (default: false).
    #[serde(default)]
    pub secure: bool,

    /// Per-request timeout in seconds (default: 300).
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl ClickHouseConfig {
    /// Connection parameters for this server.
    pub fn connection_params(&self) -> ConnectionParams {
        let credential = match (&self.jwt_token, &self.password) {
            (Some(token), _) => Some(Credential::Jwt(token.clone())),
            (None, Some(password)) => Some(Credential::Password(password.clone())),
            (None, None) => None,
        };

        ConnectionParams {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
            credential,
            secure: self.secure,
        }
    }
}

impl fmt::Debug for ClickHouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickHouseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("jwt_token", &self.jwt_token.as_ref().map(|_| "[REDACTED]"))
            .field("secure", &self.secure)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Where uploaded files are stored and output files are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Upload directory (default: "uploads").
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Output directory for file targets (default: "output").
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// Transfer behavior configuration.
/// Fields use Option<T> to distinguish between "not set" (use auto-tuned or
/// built-in default) and "explicitly set" (use provided value).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Rows per batch. Auto-tuned based on RAM if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Batches the reader may run ahead of the writer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_ahead: Option<usize>,

    /// Rows fetched by a preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_rows: Option<usize>,

    /// Data rows sampled when inferring a file schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_sample_rows: Option<usize>,
}

impl TransferSettings {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that are None (not explicitly set).
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        // Base: 10K rows, +10K per 8GB of RAM, cap at 100K
        if self.batch_size.is_none() {
            let batch = 10_000 + ((resources.total_memory_gb / 8.0) as usize * 10_000);
            self.batch_size = Some(batch.clamp(10_000, 100_000));
        }

        info!(
            "Auto-tuned config: batch_size={}, read_ahead={}",
            self.get_batch_size(),
            self.get_read_ahead()
        );

        self
    }

    pub fn get_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(10_000)
    }

    pub fn get_read_ahead(&self) -> usize {
        self.read_ahead.unwrap_or(4)
    }

    pub fn get_preview_rows(&self) -> usize {
        self.preview_rows.unwrap_or(100)
    }

    pub fn get_schema_sample_rows(&self) -> usize {
        self.schema_sample_rows.unwrap_or(100)
    }
}

// Default value functions for serde
fn default_port() -> u16 {
    8123
}

fn default_name() -> String {
    "default".to_string()
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
