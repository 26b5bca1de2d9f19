//! Torrent archive: resolves, creates, reads and deletes torrents
//!
//! Metainfo is addressed purely by name in a download-or-cache view. On a
//! local miss `create_torrent` downloads metainfo, allocates the backing
//! file and commits the metainfo with get-or-set. Concurrent creators of the
//! same name all continue with whichever bytes the store committed first, so
//! no lock is needed to converge on a single metainfo per name.

use std::sync::Arc;
use std::time::Instant;

use super::factory::{LocalTorrentFactory, TorrentFactory};
use super::{PieceBitfield, TorrentError, TorrentInfo};
use crate::config::ArchiveConfig;
use crate::metainfo::{
    FetchError, MetaInfo, MetaInfoError, MetaInfoFetcher, MetaInfoSource, SourceError,
};
use crate::storage::{MetadataKind, MetadataStore, StorageError};

/// Errors surfaced by torrent archive operations.
///
/// `NotFound` means the name is absent upstream and is the variant callers
/// branch on to treat a name as permanently invalid.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("metainfo for {name} not found")]
    NotFound { name: String },

    #[error("{name} does not exist: {source}")]
    NotExist {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("download metainfo for {name} failed after {attempts} attempts: {source}")]
    FetchExhausted {
        name: String,
        attempts: u32,
        #[source]
        source: SourceError,
    },

    #[error("parse metainfo for {name}: {source}")]
    MalformedMetaInfo {
        name: String,
        #[source]
        source: MetaInfoError,
    },

    #[error("decode piece status for {name}: {source}")]
    MalformedPieceStatus {
        name: String,
        #[source]
        source: TorrentError,
    },

    #[error("{stage} for {name}: {source}")]
    Storage {
        stage: &'static str,
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("initialize torrent {name}: {source}")]
    Build {
        name: String,
        #[source]
        source: TorrentError,
    },
}

impl ArchiveError {
    /// Checks whether the content is definitively absent upstream.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::NotFound { .. })
    }

    /// Checks whether required local state is missing.
    pub fn is_not_exist(&self) -> bool {
        matches!(self, ArchiveError::NotExist { .. })
    }

    fn storage(stage: &'static str, name: &str, source: StorageError) -> Self {
        ArchiveError::Storage {
            stage,
            name: name.to_string(),
            source,
        }
    }

    fn malformed(name: &str, source: MetaInfoError) -> Self {
        ArchiveError::MalformedMetaInfo {
            name: name.to_string(),
            source,
        }
    }
}

/// Initializes torrents in the download tier and serves torrents from
/// either the download or cache tier.
pub struct TorrentArchive<S: ?Sized, M, F = LocalTorrentFactory> {
    store: Arc<S>,
    fetcher: MetaInfoFetcher<M>,
    factory: F,
}

impl<S, M> TorrentArchive<S, M, LocalTorrentFactory>
where
    S: MetadataStore + ?Sized + 'static,
    M: MetaInfoSource,
{
    /// Creates an archive producing `LocalTorrent` handles.
    pub fn new(config: &ArchiveConfig, store: Arc<S>, source: M) -> Self {
        Self::with_factory(config, store, source, LocalTorrentFactory)
    }
}

impl<S, M, F> TorrentArchive<S, M, F>
where
    S: MetadataStore + ?Sized,
    M: MetaInfoSource,
    F: TorrentFactory<S>,
{
    /// Creates an archive with a custom torrent factory.
    ///
    /// Unset configuration values are replaced by defaults.
    pub fn with_factory(config: &ArchiveConfig, store: Arc<S>, source: M, factory: F) -> Self {
        Self::with_fetcher(store, MetaInfoFetcher::from_config(source, config), factory)
    }

    /// Creates an archive around a preconfigured fetcher.
    pub fn with_fetcher(store: Arc<S>, fetcher: MetaInfoFetcher<M>, factory: F) -> Self {
        Self {
            store,
            fetcher,
            factory,
        }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the metainfo fetcher.
    pub fn fetcher(&self) -> &MetaInfoFetcher<M> {
        &self.fetcher
    }

    /// Returns metainfo and piece status for `name`. Ignores namespace.
    ///
    /// Reads only; never contacts the metainfo source.
    ///
    /// # Errors
    ///
    /// - `ArchiveError::NotExist` - If metainfo or piece status is absent
    /// - `ArchiveError::MalformedMetaInfo` - If stored metainfo cannot be decoded
    /// - `ArchiveError::MalformedPieceStatus` - If stored piece status cannot be decoded
    ///   or does not hold one byte per piece
    /// - `ArchiveError::Storage` - If reading failed for another reason
    pub async fn stat(&self, _namespace: &str, name: &str) -> Result<TorrentInfo, ArchiveError> {
        let raw = self.read_metadata(name, MetadataKind::TorrentMeta).await?;
        let meta_info = decode_meta_info(name, &raw)?;

        let raw = self.read_metadata(name, MetadataKind::PieceStatus).await?;
        let bitfield = PieceBitfield::for_meta_info(&meta_info, &raw).map_err(|source| {
            ArchiveError::MalformedPieceStatus {
                name: name.to_string(),
                source,
            }
        })?;

        Ok(TorrentInfo::new(meta_info, bitfield))
    }

    /// Returns a torrent for existing local metainfo, or downloads metainfo
    /// and initializes the backing file.
    ///
    /// # Errors
    ///
    /// - `ArchiveError::NotFound` - If the metainfo source has no metainfo for the name
    /// - `ArchiveError::FetchExhausted` - If every download attempt failed
    /// - `ArchiveError::MalformedMetaInfo` - If stored or downloaded metainfo is corrupt
    /// - `ArchiveError::Storage` - If reading, allocating or committing failed
    /// - `ArchiveError::Build` - If the torrent handle cannot be initialized
    pub async fn create_torrent(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<F::Torrent, ArchiveError> {
        let raw = match self
            .store
            .get_metadata(name, MetadataKind::TorrentMeta)
            .await
        {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => self.download_and_commit(namespace, name).await?,
            Err(e) => return Err(ArchiveError::storage("get metainfo", name, e)),
        };

        let meta_info = decode_meta_info(name, &raw)?;
        self.build_torrent(meta_info).await
    }

    /// Returns a torrent for existing local metainfo. Ignores namespace.
    ///
    /// Never contacts the metainfo source.
    ///
    /// # Errors
    ///
    /// - `ArchiveError::NotExist` - If no metainfo is committed for the name
    /// - `ArchiveError::MalformedMetaInfo` - If stored metainfo is corrupt
    /// - `ArchiveError::Storage` - If reading failed for another reason
    /// - `ArchiveError::Build` - If the torrent handle cannot be initialized
    pub async fn get_torrent(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<F::Torrent, ArchiveError> {
        let raw = self.read_metadata(name, MetadataKind::TorrentMeta).await?;
        let meta_info = decode_meta_info(name, &raw)?;
        self.build_torrent(meta_info).await
    }

    /// Deletes the torrent's backing file from whichever tier holds it.
    ///
    /// Deleting an absent torrent succeeds.
    ///
    /// # Errors
    ///
    /// - `ArchiveError::Storage` - If deletion failed for a reason other than absence
    pub async fn delete_torrent(&self, name: &str) -> Result<(), ArchiveError> {
        match self.store.delete_file(name).await {
            Ok(()) => {
                tracing::info!("Deleted torrent {}", name);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("Torrent {} already absent", name);
                Ok(())
            }
            Err(e) => Err(ArchiveError::storage("delete file", name, e)),
        }
    }

    /// Downloads metainfo, allocates the file and returns the committed bytes.
    async fn download_and_commit(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<u8>, ArchiveError> {
        let started = Instant::now();
        let meta_info = self
            .fetcher
            .fetch(namespace, name)
            .await
            .map_err(|e| match e {
                FetchError::NotFound => ArchiveError::NotFound {
                    name: name.to_string(),
                },
                FetchError::Malformed(source) => ArchiveError::malformed(name, source),
                FetchError::Exhausted { attempts, source } => ArchiveError::FetchExhausted {
                    name: name.to_string(),
                    attempts,
                    source,
                },
            })?;
        tracing::debug!(
            "Downloaded metainfo for {} in {:?}",
            name,
            started.elapsed()
        );

        if meta_info.name() != name {
            return Err(ArchiveError::malformed(
                name,
                MetaInfoError::Invalid {
                    reason: format!("source returned metainfo for {}", meta_info.name()),
                },
            ));
        }

        // A concurrent creator may commit different metainfo after this
        // allocation. Length is derived from the name, so the file still fits.
        self.store
            .ensure_file_present(name, meta_info.length())
            .await
            .map_err(|e| ArchiveError::storage("ensure download/cache file present", name, e))?;

        let raw = meta_info
            .serialize()
            .map_err(|e| ArchiveError::malformed(name, e))?;
        let committed = self
            .store
            .get_or_set_metadata(name, MetadataKind::TorrentMeta, &raw)
            .await
            .map_err(|e| ArchiveError::storage("get or set metainfo", name, e))?;

        if committed == raw {
            tracing::info!(
                "Committed metainfo for {} ({} bytes, {} pieces)",
                name,
                meta_info.length(),
                meta_info.piece_count()
            );
        } else {
            tracing::debug!("Metainfo for {} was committed by another writer", name);
        }
        Ok(committed)
    }

    async fn read_metadata(&self, name: &str, kind: MetadataKind) -> Result<Vec<u8>, ArchiveError> {
        self.store
            .get_metadata(name, kind)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    ArchiveError::NotExist {
                        name: name.to_string(),
                        source: e,
                    }
                } else {
                    ArchiveError::storage("get metadata", name, e)
                }
            })
    }

    async fn build_torrent(&self, meta_info: MetaInfo) -> Result<F::Torrent, ArchiveError> {
        let name = meta_info.name().to_string();
        self.factory
            .build_torrent(Arc::clone(&self.store), meta_info)
            .await
            .map_err(|source| ArchiveError::Build { name, source })
    }
}

fn decode_meta_info(name: &str, raw: &[u8]) -> Result<MetaInfo, ArchiveError> {
    MetaInfo::deserialize(raw).map_err(|e| ArchiveError::malformed(name, e))
}
