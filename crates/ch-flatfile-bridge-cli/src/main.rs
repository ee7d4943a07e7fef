//! ch-flatfile-bridge CLI - Bulk transfers between ClickHouse and flat files.

mod wizard;

use ch_flatfile_bridge::{
    parse_delimiter, BridgeError, ColumnDescriptor, Config, ConnectorCatalog, Preview,
    TargetDescriptor, TransferProgress, TransferResult, Workflow,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "ch-flatfile-bridge")]
#[command(about = "Bulk transfers between ClickHouse tables and delimited flat files")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

/// A database table or a delimited file to read from.
#[derive(Args)]
struct SourceArgs {
    /// Database table
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    table: Option<String>,

    /// Delimited file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Field delimiter of the file (`\t` for tabs)
    #[arg(long, default_value = ",")]
    delimiter: String,

    /// The file has no header row; columns are named column_1, column_2, ...
    #[arg(long)]
    no_header: bool,
}

#[derive(Args)]
struct JoinArgs {
    /// Auxiliary table to join against
    #[arg(long, requires = "join_on")]
    join_table: Option<String>,

    /// Join predicate, e.g. "orders.customer_id = customers.id"
    #[arg(long, requires = "join_table")]
    join_on: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Test the database connection
    HealthCheck,

    /// List the tables of the configured database
    Tables,

    /// Show the columns of a table or file
    Schema {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Show the first rows of the selected columns
    Preview {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        join: JoinArgs,

        /// Columns to show (comma-separated, default: all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },

    /// Export a database table to a delimited file
    Export {
        /// Source table
        #[arg(long)]
        table: String,

        /// Columns to export (comma-separated, default: all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        #[command(flatten)]
        join: JoinArgs,

        /// Output file name, created inside the configured output directory
        #[arg(long)]
        output: String,

        /// Field delimiter of the output file
        #[arg(long, default_value = ",")]
        output_delimiter: String,
    },

    /// Import a delimited file into a database table
    Import {
        /// Source file
        #[arg(long)]
        file: PathBuf,

        /// Field delimiter of the file
        #[arg(long, default_value = ",")]
        delimiter: String,

        /// The file has no header row
        #[arg(long)]
        no_header: bool,

        /// Columns to import (comma-separated, default: all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Target table, created if missing
        #[arg(long)]
        target_table: String,
    },

    /// Create or edit a configuration file interactively
    Init {
        /// Output path for configuration file [default: config.yaml]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Force overwrite existing file without confirmation
        #[arg(long, short)]
        force: bool,
    },
}

/// Outcome of `health-check`.
#[derive(Debug, Serialize)]
struct HealthCheckResult {
    healthy: bool,
    database: String,
    latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tables: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, BridgeError> {
    let cli = Cli::parse();

    // Handle init command separately (doesn't need existing config)
    if let Commands::Init { output, force } = cli.command {
        // No logging setup for wizard - keeps terminal clean for interactive prompts
        let output_path = output.unwrap_or_else(|| PathBuf::from("config.yaml"));
        wizard::run_wizard(&output_path, force)
            .await
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        return Ok(ExitCode::SUCCESS);
    }

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?.with_auto_tuning();
    info!("Loaded configuration from {:?}", cli.config);

    let (catalog, registry) = ConnectorCatalog::from_config(&config)?;
    let mut workflow = Workflow::new(catalog, registry, config.transfer.clone());

    match cli.command {
        Commands::Init { .. } => unreachable!(), // Handled above

        Commands::HealthCheck => {
            let ch = config.require_clickhouse()?;
            let params = ch.connection_params();
            let start = Instant::now();
            let outcome = workflow.connect(params.clone()).await;
            let result = HealthCheckResult {
                healthy: outcome.is_ok(),
                database: params.label(),
                latency_ms: start.elapsed().as_millis() as u64,
                tables: outcome.as_ref().ok().map(|t| t.len()),
                error: outcome.as_ref().err().map(|e| e.to_string()),
            };

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  ClickHouse ({}): {} ({}ms)",
                    result.database,
                    if result.healthy { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(tables) = result.tables {
                    println!("    Tables: {}", tables);
                }
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
            }

            outcome?;
        }

        Commands::Tables => {
            let ch = config.require_clickhouse()?;
            let tables = workflow.connect(ch.connection_params()).await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                for table in &tables {
                    println!("{}", table);
                }
            }
        }

        Commands::Schema { source } => {
            let columns = open_source(&mut workflow, &config, &source).await?;
            print_schema(&columns, cli.output_json)?;
        }

        Commands::Preview {
            source,
            join,
            columns,
        } => {
            open_source(&mut workflow, &config, &source).await?;
            select(&mut workflow, &columns)?;
            if let (Some(table), Some(predicate)) = (&join.join_table, &join.join_on) {
                workflow.configure_join(table, predicate)?;
            }
            let preview = workflow.preview().await?;
            print_preview(&preview, cli.output_json)?;
        }

        Commands::Export {
            table,
            columns,
            join,
            output,
            output_delimiter,
        } => {
            let ch = config.require_clickhouse()?;
            let delimiter = parse_delimiter(&output_delimiter)?;
            workflow.connect(ch.connection_params()).await?;
            workflow.fetch_schema(Some(&table)).await?;
            select(&mut workflow, &columns)?;
            if let (Some(aux), Some(predicate)) = (&join.join_table, &join.join_on) {
                workflow.configure_join(aux, predicate)?;
            }

            let target = TargetDescriptor::FlatFile {
                filename: output,
                delimiter,
            };
            let result = transfer(workflow, target, cli.progress).await?;
            return report(&result, cli.output_json);
        }

        Commands::Import {
            file,
            delimiter,
            no_header,
            columns,
            target_table,
        } => {
            let ch = config.require_clickhouse()?;
            let delimiter = parse_delimiter(&delimiter)?;
            workflow.register_file(&file, delimiter, !no_header)?;
            workflow.fetch_schema(None).await?;
            select(&mut workflow, &columns)?;

            let target = TargetDescriptor::DatabaseTable {
                connection: ch.connection_params(),
                table: target_table,
            };
            let result = transfer(workflow, target, cli.progress).await?;
            return report(&result, cli.output_json);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays parseable with --output-json.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Connect to the table or register the file, then load its schema.
async fn open_source(
    workflow: &mut Workflow,
    config: &Config,
    source: &SourceArgs,
) -> Result<Vec<ColumnDescriptor>, BridgeError> {
    match (&source.table, &source.file) {
        (Some(table), _) => {
            let ch = config.require_clickhouse()?;
            workflow.connect(ch.connection_params()).await?;
            workflow.fetch_schema(Some(table)).await
        }
        (None, Some(file)) => {
            let delimiter = parse_delimiter(&source.delimiter)?;
            workflow.register_file(file, delimiter, !source.no_header)?;
            workflow.fetch_schema(None).await
        }
        (None, None) => Err(BridgeError::Config(
            "either --table or --file is required".to_string(),
        )),
    }
}

fn select(workflow: &mut Workflow, columns: &[String]) -> Result<(), BridgeError> {
    if columns.is_empty() {
        workflow.select_all()?;
    } else {
        workflow.select_columns(columns)?;
    }
    Ok(())
}

/// Run the transfer, printing progress JSON lines to stderr when asked.
async fn transfer(
    workflow: Workflow,
    target: TargetDescriptor,
    progress: bool,
) -> Result<TransferResult, BridgeError> {
    let (mut workflow, printer) = if progress {
        let (tx, rx) = mpsc::channel(64);
        (workflow.with_progress(tx), Some(spawn_progress_printer(rx)))
    } else {
        (workflow, None)
    };

    let result = workflow.start_transfer(target).await;

    // Closing the sender lets the printer drain and exit.
    drop(workflow);
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    result
}

fn spawn_progress_printer(
    mut rx: mpsc::Receiver<TransferProgress>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            if let Ok(line) = serde_json::to_string(&update) {
                eprintln!("{}", line);
            }
        }
    })
}

fn report(result: &TransferResult, output_json: bool) -> Result<ExitCode, BridgeError> {
    if output_json {
        println!("{}", result.to_json()?);
    } else if result.success {
        println!("\nTransfer completed!");
        println!("  Run ID: {}", result.run_id);
        println!("  Target: {}", result.target_label.as_deref().unwrap_or("-"));
        println!("  Rows: {}", result.row_count.unwrap_or(result.rows_written));
        println!("  Batches: {}", result.batches_written);
        println!("  Duration: {:.2}s", result.duration_seconds);
    } else {
        println!("\nTransfer failed!");
        println!("  Run ID: {}", result.run_id);
        println!(
            "  Committed before failure: {} rows in {} batches",
            result.rows_written, result.batches_written
        );
        println!("  Duration: {:.2}s", result.duration_seconds);
    }

    if result.success {
        Ok(ExitCode::SUCCESS)
    } else {
        if let Some(ref message) = result.message {
            eprintln!("Error: {}", message);
        }
        Ok(ExitCode::from(result.error_code.unwrap_or(1)))
    }
}

fn print_schema(columns: &[ColumnDescriptor], output_json: bool) -> Result<(), BridgeError> {
    if output_json {
        println!("{}", serde_json::to_string_pretty(columns)?);
        return Ok(());
    }

    let width = columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for column in columns {
        println!("{:<width$}  {}", column.name, column.data_type, width = width);
    }
    Ok(())
}

fn print_preview(preview: &Preview, output_json: bool) -> Result<(), BridgeError> {
    if output_json {
        println!("{}", serde_json::to_string_pretty(preview)?);
        return Ok(());
    }

    println!("{}", preview.columns.join("\t"));
    for row in preview.rows_as_vectors() {
        println!("{}", row.join("\t"));
    }
    println!("\n({} rows)", preview.len());
    Ok(())
}
