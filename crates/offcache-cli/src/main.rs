//! offcache - keeps the analytics dashboard's static shell available offline.
//!
//! Hosts the offline cache manager: installs the compiled-in asset manifest
//! into a versioned cache, purges older generations on activation and
//! answers requests network-first with a cache fallback.

mod args;
mod commands;
mod host;

use std::io;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use offcache_core::Config;

use args::{Cli, Commands};
use host::Host;

/// Log file name used when `log_file` points at a directory-less name
const DEFAULT_LOG_FILE: &str = "offcache.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard must be held until exit so file logs are flushed.
fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Option<WorkerGuard> {
    // RUST_LOG wins over -v
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| DEFAULT_LOG_FILE.into());
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(ref path) => path.clone(),
        None => Config::config_path()?,
    };
    let config = Config::load_from(&config_path)?;

    let _guard = init_tracing(cli.verbose, config.log_file.as_deref());
    info!(config = %config_path.display(), "offcache starting");

    let code = match cli.command {
        Commands::Config(ref args) => {
            commands::config(&config_path, &config, args)?;
            ExitCode::SUCCESS
        }
        Commands::Install(ref args) => {
            let host = Host::start(&config)?;
            commands::install(&host, args).await?;
            ExitCode::SUCCESS
        }
        Commands::Fetch(ref args) => {
            let host = Host::start(&config)?;
            commands::fetch(&host, args).await?
        }
        Commands::Status => {
            let host = Host::start(&config)?;
            commands::status(&host).await?;
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}
