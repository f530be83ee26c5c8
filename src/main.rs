use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lineshift::{
    BatchCoordinator, BatchRequest, BatchResponse, Config, DiskStore, EntryKind, FileStore,
    FileTools, Server, json::resolve_execution_id, resolve_absolute,
};
use tracing_subscriber::EnvFilter;

/// Line-range file editing tools with shift-tracked batch edits
#[derive(Parser, Debug)]
#[command(name = "lineshift")]
#[command(version)]
#[command(about = "Line-range file editing tools for automated agents", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true, env = "LINESHIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format; logs always go to stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Refuse to load files larger than this many bytes
    #[arg(long, global = true)]
    max_file_bytes: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the file tools as JSON-RPC over stdin/stdout
    Serve,

    /// Apply one batch of line edits to a file
    Apply {
        /// Absolute path of the file to edit
        #[arg(short, long)]
        file: String,

        /// JSON file containing the batch request (omit to read from stdin)
        #[arg(short, long)]
        edits: Option<PathBuf>,

        /// Output structured JSON instead of the text report
        #[arg(short, long)]
        json: bool,

        /// Write output to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init(),
    }
}

/// Read a BatchRequest from a file path or stdin
fn read_batch_request(path: Option<&PathBuf>) -> Result<BatchRequest> {
    let json_str = if let Some(p) = path {
        fs::read_to_string(p).with_context(|| format!("Failed to read edits file {:?}", p))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read edits from stdin")?;
        buffer
    };

    serde_json::from_str(&json_str).context("Invalid batch request JSON")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(max) = cli.max_file_bytes {
        config.max_file_bytes = max;
    }

    init_logging(&config.log_level, cli.log_format);
    let store = DiskStore::new(config.max_file_bytes);

    match cli.command {
        Command::Serve => {
            let server = Server::new(FileTools::new(store, config));
            let stdin = io::stdin();
            server.serve(stdin.lock(), io::stdout().lock())?;
            Ok(())
        }
        Command::Apply {
            file,
            edits,
            json,
            output,
        } => {
            let request = read_batch_request(edits.as_ref())?;
            let execution_id = resolve_execution_id(&request.execution_id);

            let result = resolve_absolute(&file)
                .and_then(|path| store.assert_exists(&path, EntryKind::File).map(|_| path))
                .map_err(lineshift::BatchError::from)
                .and_then(|path| {
                    BatchCoordinator::new(&store).apply(
                        &path,
                        &request.edits,
                        request.expected_checksum.as_deref(),
                    )
                });

            let (text, succeeded) = match result {
                Ok(report) => {
                    let text = if json {
                        serde_json::to_string_pretty(&BatchResponse::from_report(execution_id, &report))?
                    } else {
                        report.to_string()
                    };
                    (text, true)
                }
                Err(e) => {
                    let text = if json {
                        serde_json::to_string_pretty(&BatchResponse::failure(execution_id, e.to_string()))?
                    } else {
                        e.to_string()
                    };
                    (text, false)
                }
            };

            if let Some(path) = output {
                fs::write(&path, &text).with_context(|| format!("Failed to write output to {:?}", path))?;
            } else {
                println!("{}", text);
            }

            if !succeeded {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
