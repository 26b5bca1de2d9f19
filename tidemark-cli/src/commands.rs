//! CLI command implementations

use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use tidemark_core::config::TidemarkConfig;
use tidemark_core::metainfo::HttpMetaInfoSource;
use tidemark_core::storage::TieredFileStore;
use tidemark_core::torrent::{LocalTorrent, TorrentArchive};

type Archive = TorrentArchive<TieredFileStore, HttpMetaInfoSource>;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show metainfo and piece progress of a local torrent
    Stat {
        /// Namespace the blob belongs to
        namespace: String,
        /// Content digest of the blob
        name: String,
    },
    /// Resolve a torrent, downloading metainfo and allocating the file if needed
    Create {
        /// Namespace the blob belongs to
        namespace: String,
        /// Content digest of the blob
        name: String,
    },
    /// Open a torrent that already exists locally
    Get {
        /// Namespace the blob belongs to
        namespace: String,
        /// Content digest of the blob
        name: String,
    },
    /// Delete a torrent's backing file
    Delete {
        /// Content digest of the blob
        name: String,
    },
    /// Move a torrent from the download tier into the cache tier
    Cache {
        /// Content digest of the blob
        name: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the archive or storage error of the failing command
pub async fn handle_command(command: Commands, config: &TidemarkConfig) -> anyhow::Result<()> {
    let archive = create_archive(config)?;

    match command {
        Commands::Stat { namespace, name } => {
            let info = archive.stat(&namespace, &name).await?;
            println!("{info}");
        }
        Commands::Create { namespace, name } => {
            let torrent = archive.create_torrent(&namespace, &name).await?;
            print_torrent(&torrent);
        }
        Commands::Get { namespace, name } => {
            let torrent = archive.get_torrent(&namespace, &name).await?;
            print_torrent(&torrent);
        }
        Commands::Delete { name } => {
            archive.delete_torrent(&name).await?;
            println!("Deleted {name}");
        }
        Commands::Cache { name } => {
            archive
                .store()
                .move_to_cache(&name)
                .await
                .with_context(|| format!("move {name} to cache"))?;
            println!("Moved {name} to cache");
        }
    }

    Ok(())
}

fn create_archive(config: &TidemarkConfig) -> anyhow::Result<Archive> {
    let store = Arc::new(TieredFileStore::new(
        config.store.download_dir.clone(),
        config.store.cache_dir.clone(),
    ));
    let source = HttpMetaInfoSource::new(&config.source)
        .with_context(|| format!("create metainfo client for {}", config.source.tracker_url))?;

    Ok(TorrentArchive::new(&config.archive, store, source))
}

fn print_torrent(torrent: &LocalTorrent<TieredFileStore>) {
    println!("Torrent: {}", torrent.name());
    println!("  Length: {} bytes", torrent.length());
    println!("  Piece length: {} bytes", torrent.meta_info().piece_length());
    println!(
        "  Pieces: {}/{} complete",
        torrent.num_complete(),
        torrent.piece_count()
    );
}
