//! Tidemark CLI - Command-line interface
//!
//! Provides command-line access to the torrent archive.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use tidemark_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "tidemark")]
#[command(about = "Resolve, create and delete archived torrents")]
#[command(version)]
struct Cli {
    /// Download tier directory
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,
    /// Cache tier directory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// Base URL of the tracker serving metainfo
    #[arg(long, global = true)]
    tracker: Option<String>,
    /// Console log level
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Warn)]
    log_level: CliLogLevel,
    /// Directory for the full debug log of this run
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())?;

    let mut config = tidemark_core::TidemarkConfig::from_env();
    if let Some(dir) = cli.download_dir {
        config.store.download_dir = dir;
    }
    if let Some(dir) = cli.cache_dir {
        config.store.cache_dir = dir;
    }
    if let Some(url) = cli.tracker {
        config.source.tracker_url = url;
    }

    commands::handle_command(cli.command, &config).await
}
