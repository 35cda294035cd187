//! CLI argument definitions using clap derive

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// offcache - keeps the dashboard's static shell available offline
///
/// Installs the compiled-in static asset manifest into a versioned cache,
/// purges older cache generations and serves requests network-first with a
/// cache fallback.
#[derive(Parser, Debug)]
#[command(name = "offcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "OFFCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Populate the current cache generation and activate it
    Install(InstallArgs),

    /// Fetch one URL through the offline cache
    Fetch(FetchArgs),

    /// List cache generations and their entries
    Status,

    /// Show the effective configuration
    Config(ConfigArgs),
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Install only; keep older generations and do not take control
    #[arg(long)]
    pub no_activate: bool,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute URL, or a path resolved against the configured origin
    pub target: String,

    /// Write the body to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Write a config file with every default filled in
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing file with --init
    #[arg(long, requires = "init")]
    pub force: bool,
}
