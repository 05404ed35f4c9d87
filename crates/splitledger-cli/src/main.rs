//! splitledger - split expenses with friends and groups from the terminal.
//!
//! Thin command-line front end over `splitledger-core`: every command issues
//! its calls through the shared `ApiClient`, which keeps the stored session
//! alive and sends the user back to `login` when it cannot.

mod commands;
mod prompt;
mod render;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use splitledger_core::api::ApiError;
use splitledger_core::config::StorageBackend;
use splitledger_core::Config;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Command;

/// Directory for an optional rolling log file
const ENV_LOG_DIR: &str = "SPLITLEDGER_LOG_DIR";

/// Log file prefix inside `SPLITLEDGER_LOG_DIR`
const LOG_FILE_PREFIX: &str = "splitledger.log";

/// Split expenses with friends and groups
#[derive(Parser, Debug)]
#[command(name = "splitledger", author, version, about, long_about = None)]
struct Cli {
    /// Backend base URL, e.g. http://localhost:8000/api/v1
    #[arg(long, global = true, env = "SPLITLEDGER_API_URL")]
    api_url: Option<String>,

    /// Keep the session in memory only; nothing is written to disk
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();
    info!("splitledger starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ApiError>() {
                Some(api_err) if api_err.requires_login() => {
                    eprintln!("Error: {}", api_err);
                    eprintln!("Run `splitledger login` to sign in.");
                }
                _ => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.base_url = Some(url);
    }
    if cli.ephemeral {
        config.storage = StorageBackend::Memory;
    }
    debug!(base_url = config.base_url(), storage = ?config.storage, "Configuration loaded");

    let session = config.session_store()?;
    let api = config.api_client(session)?;

    let ctx = commands::Context {
        api,
        config,
        json: cli.json,
    };
    commands::run(cli.command, ctx).await
}
