//! Configuration validation.

use super::Config;
use crate::error::{BridgeError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if let Some(ch) = &config.clickhouse {
        if ch.host.trim().is_empty() {
            return Err(BridgeError::Config("clickhouse.host is required".into()));
        }
        if ch.port == 0 {
            return Err(BridgeError::Config(
                "clickhouse.port must be between 1 and 65535".into(),
            ));
        }
        if ch.database.is_empty() {
            return Err(BridgeError::Config(
                "clickhouse.database cannot be empty".into(),
            ));
        }
        if ch.password.is_some() && ch.jwt_token.is_some() {
            return Err(BridgeError::Config(
                "clickhouse.password and clickhouse.jwt_token are mutually exclusive".into(),
            ));
        }
        if ch.timeout_seconds == 0 {
            return Err(BridgeError::Config(
                "clickhouse.timeout_seconds must be at least 1".into(),
            ));
        }
    }

    // Transfer settings - only check if explicitly set
    let checks = [
        ("transfer.batch_size", config.transfer.batch_size),
        ("transfer.read_ahead", config.transfer.read_ahead),
        ("transfer.preview_rows", config.transfer.preview_rows),
        ("transfer.schema_sample_rows", config.transfer.schema_sample_rows),
    ];
    for (name, value) in checks {
        if let Some(0) = value {
            return Err(BridgeError::Config(format!("{} must be at least 1", name)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClickHouseConfig, FilesConfig, TransferSettings};

    fn valid_config() -> Config {
        Config {
            clickhouse: Some(ClickHouseConfig {
                host: "localhost".to_string(),
                port: 8123,
                database: "default".to_string(),
                user: "default".to_string(),
                password: Some("password".to_string()),
                jwt_token: None,
                secure: false,
                timeout_seconds: 300,
            }),
            files: FilesConfig::default(),
            transfer: TransferSettings::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_database_section_is_optional() {
        let mut config = valid_config();
        config.clickhouse = None;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        if let Some(ch) = config.clickhouse.as_mut() {
            ch.host = "  ".to_string();
        }
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_port() {
        let mut config = valid_config();
        if let Some(ch) = config.clickhouse.as_mut() {
            ch.port = 0;
        }
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_password_and_jwt_exclusive() {
        let mut config = valid_config();
        if let Some(ch) = config.clickhouse.as_mut() {
            ch.jwt_token = Some("eyJ".to_string());
        }
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = valid_config();
        config.transfer.batch_size = Some(0);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("transfer.batch_size"));
    }

    #[test]
    fn test_zero_preview_rows() {
        let mut config = valid_config();
        config.transfer.preview_rows = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_clickhouse_config_debug_redacts_password() {
        let mut config = valid_config();
        if let Some(ch) = config.clickhouse.as_mut() {
            ch.password = Some("super_secret_password_123".to_string());
        }
        let debug_output = format!("{:?}", config.clickhouse);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
