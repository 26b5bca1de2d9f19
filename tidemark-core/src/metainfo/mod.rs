//! Torrent metainfo: the descriptor type, remote sources and the retrying fetcher

pub mod fetcher;
pub mod source;
pub mod types;

pub use fetcher::{FetchError, MetaInfoFetcher, RetryStrategy};
pub use source::{HttpMetaInfoSource, MetaInfoSource, SourceError};
pub use types::{Info, MetaInfo, MetaInfoError, PieceHash};
