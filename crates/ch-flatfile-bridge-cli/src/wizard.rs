//! Interactive configuration wizard for creating/editing config files.

use ch_flatfile_bridge::{
    ClickHouseConfig, ClickHouseConnector, Config, Connector, FilesConfig, TransferSettings,
};
use dialoguer::{Confirm, Input, Password, Select};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result type for wizard operations.
pub type WizardResult<T> = Result<T, WizardError>;

/// Errors that can occur during wizard execution.
#[derive(Debug)]
pub enum WizardError {
    /// User cancelled the wizard.
    Cancelled,
    /// IO error (file read/write).
    Io(std::io::Error),
    /// Config serialization error.
    Config(String),
    /// Validation error.
    Validation(String),
}

impl std::fmt::Display for WizardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "Configuration cancelled"),
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Config(msg) => write!(f, "Config error: {}", msg),
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for WizardError {}

impl From<std::io::Error> for WizardError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<dialoguer::Error> for WizardError {
    fn from(e: dialoguer::Error) -> Self {
        Self::Io(std::io::Error::other(e.to_string()))
    }
}

/// Action to take when config file already exists.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ExistingFileAction {
    Edit,
    Overwrite,
    Abort,
}

/// How the wizard authenticates against ClickHouse.
#[derive(Debug, Clone, Copy, PartialEq)]
enum AuthMethod {
    None,
    Password,
    Jwt,
}

/// Run the configuration wizard.
pub async fn run_wizard(output: &Path, force: bool) -> WizardResult<()> {
    println!();
    println!("ClickHouse <-> Flat File Bridge - Configuration Wizard");
    println!("======================================================");
    println!();

    let existing_config = if output.exists() && !force {
        match prompt_existing_file_action(output)? {
            ExistingFileAction::Edit => {
                println!("Loading existing configuration...");
                match Config::load(output) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        println!("Warning: Could not parse existing file: {}", e);
                        println!("Starting with fresh configuration.\n");
                        None
                    }
                }
            }
            ExistingFileAction::Overwrite => {
                println!("Starting with fresh configuration.\n");
                None
            }
            ExistingFileAction::Abort => {
                return Err(WizardError::Cancelled);
            }
        }
    } else {
        None
    };

    let clickhouse = prompt_clickhouse_config(
        existing_config.as_ref().and_then(|c| c.clickhouse.as_ref()),
    )?;
    let files = prompt_files_config(existing_config.as_ref().map(|c| &c.files))?;
    let transfer = prompt_transfer_settings(existing_config.as_ref().map(|c| &c.transfer))?;

    let config = Config {
        clickhouse,
        files,
        transfer,
    };

    if let Err(e) = config.validate() {
        return Err(WizardError::Validation(e.to_string()));
    }

    print_summary(&config);

    if let Some(ref ch) = config.clickhouse {
        if prompt_connection_test()? {
            test_connection(ch).await;
        }
    }

    if !prompt_save_confirm(output)? {
        return Err(WizardError::Cancelled);
    }

    write_config(&config, output)?;

    println!("\nConfiguration saved to {}", output.display());
    println!("Run 'ch-flatfile-bridge health-check' to verify the connection.");

    Ok(())
}

fn prompt_existing_file_action(path: &Path) -> WizardResult<ExistingFileAction> {
    println!("File already exists: {}\n", path.display());

    let options = &["Edit existing configuration", "Overwrite with new", "Abort"];
    let selection = Select::new()
        .with_prompt("What would you like to do?")
        .items(options)
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => ExistingFileAction::Edit,
        1 => ExistingFileAction::Overwrite,
        _ => ExistingFileAction::Abort,
    })
}

fn prompt_clickhouse_config(
    existing: Option<&ClickHouseConfig>,
) -> WizardResult<Option<ClickHouseConfig>> {
    println!("ClickHouse Database");
    println!("-------------------");

    let configure = Confirm::new()
        .with_prompt("  Configure a ClickHouse connection")
        .default(true)
        .interact()?;
    if !configure {
        println!();
        return Ok(None);
    }

    let host: String = Input::new()
        .with_prompt("  Host")
        .default(
            existing
                .map(|c| c.host.clone())
                .unwrap_or_else(|| "localhost".to_string()),
        )
        .interact_text()?;

    let secure = Confirm::new()
        .with_prompt("  Use HTTPS")
        .default(existing.map(|c| c.secure).unwrap_or(false))
        .interact()?;

    let port: u16 = Input::new()
        .with_prompt("  HTTP port")
        .default(
            existing
                .map(|c| c.port)
                .unwrap_or(if secure { 8443 } else { 8123 }),
        )
        .interact_text()?;

    let database: String = Input::new()
        .with_prompt("  Database")
        .default(
            existing
                .map(|c| c.database.clone())
                .unwrap_or_else(|| "default".to_string()),
        )
        .interact_text()?;

    let user: String = Input::new()
        .with_prompt("  User")
        .default(
            existing
                .map(|c| c.user.clone())
                .unwrap_or_else(|| "default".to_string()),
        )
        .interact_text()?;

    let methods = &["None", "Password", "JWT token"];
    let default_idx = match existing {
        Some(c) if c.jwt_token.is_some() => 2,
        Some(c) if c.password.is_some() => 1,
        _ => 0,
    };
    let method = match Select::new()
        .with_prompt("  Authentication")
        .items(methods)
        .default(default_idx)
        .interact()?
    {
        1 => AuthMethod::Password,
        2 => AuthMethod::Jwt,
        _ => AuthMethod::None,
    };

    let (password, jwt_token) = match method {
        AuthMethod::None => (None, None),
        AuthMethod::Password => {
            let kept = existing.and_then(|c| c.password.clone());
            (Some(prompt_secret("  Password", kept)?), None)
        }
        AuthMethod::Jwt => {
            let kept = existing.and_then(|c| c.jwt_token.clone());
            (None, Some(prompt_secret("  JWT token", kept)?))
        }
    };

    let timeout_seconds: u64 = Input::new()
        .with_prompt("  Request timeout (seconds)")
        .default(existing.map(|c| c.timeout_seconds).unwrap_or(300))
        .interact_text()?;

    println!();

    Ok(Some(ClickHouseConfig {
        host,
        port,
        database,
        user,
        password,
        jwt_token,
        secure,
        timeout_seconds,
    }))
}

fn prompt_files_config(existing: Option<&FilesConfig>) -> WizardResult<FilesConfig> {
    println!("Files");
    println!("-----");

    let defaults = existing.cloned().unwrap_or_default();

    let upload_dir: String = Input::new()
        .with_prompt("  Upload directory")
        .default(defaults.upload_dir.display().to_string())
        .interact_text()?;

    let output_dir: String = Input::new()
        .with_prompt("  Output directory")
        .default(defaults.output_dir.display().to_string())
        .interact_text()?;

    println!();

    Ok(FilesConfig {
        upload_dir: PathBuf::from(upload_dir),
        output_dir: PathBuf::from(output_dir),
    })
}

fn prompt_transfer_settings(
    existing: Option<&TransferSettings>,
) -> WizardResult<TransferSettings> {
    println!("Transfer Settings");
    println!("  (Leave blank to use auto-tuned values)");

    let mut settings = existing.cloned().unwrap_or_default();
    settings.batch_size =
        prompt_optional_usize("  Batch size (rows)", existing.and_then(|c| c.batch_size))?;
    settings.read_ahead =
        prompt_optional_usize("  Read-ahead batches", existing.and_then(|c| c.read_ahead))?;
    settings.preview_rows =
        prompt_optional_usize("  Preview rows", existing.and_then(|c| c.preview_rows))?;

    println!();
    Ok(settings)
}

/// Prompt for a secret, keeping `existing` when the input is blank.
fn prompt_secret(prompt: &str, existing: Option<String>) -> WizardResult<String> {
    match existing {
        Some(kept) => {
            let input: String = Password::new()
                .with_prompt(format!("{} (blank to keep existing)", prompt))
                .allow_empty_password(true)
                .interact()?;
            Ok(if input.is_empty() { kept } else { input })
        }
        None => Ok(Password::new().with_prompt(prompt).interact()?),
    }
}

fn prompt_optional_usize(prompt: &str, existing: Option<usize>) -> WizardResult<Option<usize>> {
    let default_str = existing
        .map(|v| v.to_string())
        .unwrap_or_else(|| "auto".to_string());

    let input: String = Input::new()
        .with_prompt(prompt)
        .default(default_str)
        .allow_empty(true)
        .interact_text()?;

    Ok(parse_optional_usize(&input))
}

/// `auto`, blank, zero or garbage all mean "use the default".
fn parse_optional_usize(input: &str) -> Option<usize> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
        return None;
    }
    match trimmed.parse::<usize>() {
        Ok(0) | Err(_) => {
            println!("    Invalid number, using the default");
            None
        }
        Ok(v) => Some(v),
    }
}

fn print_summary(config: &Config) {
    println!("Configuration Summary");
    println!("---------------------");
    match config.clickhouse {
        Some(ref ch) => {
            let auth = if ch.jwt_token.is_some() {
                "jwt"
            } else if ch.password.is_some() {
                "password"
            } else {
                "none"
            };
            println!(
                "  ClickHouse: {}@{}:{}/{} (auth: {}, https: {})",
                ch.user, ch.host, ch.port, ch.database, auth, ch.secure
            );
        }
        None => println!("  ClickHouse: not configured"),
    }
    println!("  Uploads: {}", config.files.upload_dir.display());
    println!("  Output: {}", config.files.output_dir.display());
    if let Some(batch_size) = config.transfer.batch_size {
        println!("  Batch size: {}", batch_size);
    }
    println!();
}

fn prompt_connection_test() -> WizardResult<bool> {
    Ok(Confirm::new()
        .with_prompt("Test the database connection?")
        .default(false)
        .interact()?)
}

async fn test_connection(config: &ClickHouseConfig) {
    println!("\nTesting connection...");

    // Cap the wait well below the configured request timeout.
    let timeout = Duration::from_secs(config.timeout_seconds.min(30));
    let connector = match ClickHouseConnector::new(timeout) {
        Ok(connector) => connector,
        Err(e) => {
            println!("  Failed to initialize: {}", e);
            println!();
            return;
        }
    };

    let params = config.connection_params();
    match connector.ping(&params).await {
        Ok(()) => match connector.list_tables(&params).await {
            Ok(tables) => println!("  ClickHouse: OK ({} tables)", tables.len()),
            Err(e) => println!("  ClickHouse: connected, but listing tables failed: {}", e),
        },
        Err(e) => println!("  ClickHouse: FAILED\n    Error: {}", e),
    }
    println!();
}

fn prompt_save_confirm(path: &Path) -> WizardResult<bool> {
    Ok(Confirm::new()
        .with_prompt(format!("Save to {}?", path.display()))
        .default(true)
        .interact()?)
}

fn write_config(config: &Config, path: &Path) -> WizardResult<()> {
    let header = "# ClickHouse <-> flat file bridge configuration\n\
                  # Generated by ch-flatfile-bridge init\n";
    let yaml = serde_yaml::to_string(config).map_err(|e| WizardError::Config(e.to_string()))?;
    std::fs::write(path, format!("{}{}", header, yaml))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional_usize() {
        assert_eq!(parse_optional_usize("auto"), None);
        assert_eq!(parse_optional_usize("  "), None);
        assert_eq!(parse_optional_usize("0"), None);
        assert_eq!(parse_optional_usize("abc"), None);
        assert_eq!(parse_optional_usize(" 5000 "), Some(5000));
    }

    #[test]
    fn test_write_config_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let config = Config {
            clickhouse: Some(ClickHouseConfig {
                host: "ch.internal".to_string(),
                port: 8123,
                database: "analytics".to_string(),
                user: "loader".to_string(),
                password: Some("secret".to_string()),
                jwt_token: None,
                secure: false,
                timeout_seconds: 60,
            }),
            ..Default::default()
        };

        write_config(&config, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# ClickHouse"));
        let loaded = Config::load(&path).unwrap();
        let ch = loaded.require_clickhouse().unwrap();
        assert_eq!(ch.database, "analytics");
        assert_eq!(ch.password.as_deref(), Some("secret"));
        assert_eq!(ch.timeout_seconds, 60);
    }
}
