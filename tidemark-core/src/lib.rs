//! Tidemark Core - torrent archive over tiered local storage
//!
//! Resolves or creates torrent metainfo and backing files for
//! content-addressed blobs. Local state lives in a download tier and a cache
//! tier behind one storage view; missing metainfo is fetched from a remote
//! source with bounded retries and committed first-writer-wins.

pub mod config;
pub mod metainfo;
pub mod storage;
pub mod torrent;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::{ArchiveConfig, TidemarkConfig};
pub use metainfo::{HttpMetaInfoSource, MetaInfo, MetaInfoFetcher, MetaInfoSource, RetryStrategy};
pub use storage::{MetadataKind, MetadataStore, StorageError, TieredFileStore};
pub use torrent::{
    ArchiveError, LocalTorrent, LocalTorrentFactory, TorrentArchive, TorrentFactory, TorrentInfo,
};
