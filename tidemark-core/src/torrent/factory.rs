//! Torrent handle construction from committed metainfo

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::{PieceBitfield, PieceStatus, TorrentError, TorrentInfo};
use crate::metainfo::MetaInfo;
use crate::storage::{MetadataKind, MetadataStore};

/// Builds usable torrent handles from a store and committed metainfo.
///
/// Construction depends only on its inputs and fails when the metainfo does
/// not match local state.
#[async_trait]
pub trait TorrentFactory<S: ?Sized>: Send + Sync {
    /// Handle type produced by this factory.
    type Torrent: Send;

    /// Builds a handle for `meta_info` backed by `store`.
    ///
    /// # Errors
    ///
    /// - `TorrentError` - If local state is inconsistent with the metainfo
    async fn build_torrent(
        &self,
        store: Arc<S>,
        meta_info: MetaInfo,
    ) -> Result<Self::Torrent, TorrentError>;
}

/// Factory producing `LocalTorrent` handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTorrentFactory;

#[async_trait]
impl<S> TorrentFactory<S> for LocalTorrentFactory
where
    S: MetadataStore + ?Sized + 'static,
{
    type Torrent = LocalTorrent<S>;

    async fn build_torrent(
        &self,
        store: Arc<S>,
        meta_info: MetaInfo,
    ) -> Result<LocalTorrent<S>, TorrentError> {
        LocalTorrent::open(store, meta_info).await
    }
}

/// Torrent backed by a file in the download or cache tier.
pub struct LocalTorrent<S: ?Sized> {
    meta_info: MetaInfo,
    bitfield: PieceBitfield,
    store: Arc<S>,
}

impl<S: MetadataStore + ?Sized> LocalTorrent<S> {
    /// Opens the torrent, initializing its piece status if absent.
    ///
    /// # Errors
    ///
    /// - `TorrentError::FileLengthMismatch` - If the backing file length differs from metainfo
    /// - `TorrentError::InvalidPieceStatus` - If stored piece status cannot be decoded
    /// - `TorrentError::Storage` - If the backing file is missing or storage failed
    pub async fn open(store: Arc<S>, meta_info: MetaInfo) -> Result<Self, TorrentError> {
        let name = meta_info.name();

        let actual = store.file_size(name).await?;
        if actual != meta_info.length() {
            return Err(TorrentError::FileLengthMismatch {
                name: name.to_string(),
                expected: meta_info.length(),
                actual,
            });
        }

        let empty = vec![PieceStatus::Empty as u8; meta_info.piece_count()];
        let raw = store
            .get_or_set_metadata(name, MetadataKind::PieceStatus, &empty)
            .await?;
        let bitfield = PieceBitfield::for_meta_info(&meta_info, &raw)?;

        Ok(Self {
            meta_info,
            bitfield,
            store,
        })
    }
}

impl<S: ?Sized> LocalTorrent<S> {
    /// Returns the content name.
    pub fn name(&self) -> &str {
        self.meta_info.name()
    }

    /// Returns the declared length.
    pub fn length(&self) -> u64 {
        self.meta_info.length()
    }

    pub fn meta_info(&self) -> &MetaInfo {
        &self.meta_info
    }

    pub fn piece_count(&self) -> usize {
        self.meta_info.piece_count()
    }

    pub fn has_piece(&self, index: usize) -> bool {
        self.bitfield.has_piece(index)
    }

    /// Returns the number of complete pieces when the handle was opened.
    pub fn num_complete(&self) -> usize {
        self.bitfield.count_complete()
    }

    pub fn complete(&self) -> bool {
        self.num_complete() == self.piece_count()
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns a snapshot of metainfo and progress.
    pub fn stat(&self) -> TorrentInfo {
        TorrentInfo::new(self.meta_info.clone(), self.bitfield.clone())
    }
}

impl<S: ?Sized> fmt::Debug for LocalTorrent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTorrent")
            .field("name", &self.name())
            .field("length", &self.length())
            .field("pieces", &self.piece_count())
            .field("complete", &self.num_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryStore, StorageError};

    fn create_test_meta_info() -> MetaInfo {
        MetaInfo::from_blob("abc", &[3u8; 100], 32).unwrap()
    }

    #[tokio::test]
    async fn test_open_initializes_piece_status() {
        let store = Arc::new(InMemoryStore::new());
        store.ensure_file_present("abc", 100).await.unwrap();

        let torrent = LocalTorrentFactory
            .build_torrent(Arc::clone(&store), create_test_meta_info())
            .await
            .unwrap();

        assert_eq!(torrent.piece_count(), 4);
        assert_eq!(torrent.num_complete(), 0);
        assert!(!torrent.complete());
        assert_eq!(
            store
                .get_metadata("abc", MetadataKind::PieceStatus)
                .await
                .unwrap(),
            vec![0u8; 4]
        );
    }

    #[tokio::test]
    async fn test_open_reads_existing_piece_status() {
        let store = Arc::new(InMemoryStore::new());
        store.ensure_file_present("abc", 100).await.unwrap();
        store.put_metadata("abc", MetadataKind::PieceStatus, &[1, 1, 1, 1]);

        let torrent = LocalTorrent::open(store, create_test_meta_info())
            .await
            .unwrap();

        assert!(torrent.complete());
        assert!(torrent.has_piece(3));
        assert_eq!(torrent.stat().percent_downloaded(), 100);
    }

    #[tokio::test]
    async fn test_open_rejects_length_mismatch() {
        let store = Arc::new(InMemoryStore::new());
        store.ensure_file_present("abc", 99).await.unwrap();

        let err = LocalTorrent::open(store, create_test_meta_info())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TorrentError::FileLengthMismatch {
                expected: 100,
                actual: 99,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_open_requires_backing_file() {
        let store = Arc::new(InMemoryStore::new());

        let err = LocalTorrent::open(store, create_test_meta_info())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TorrentError::Storage(StorageError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_rejects_truncated_piece_status() {
        let store = Arc::new(InMemoryStore::new());
        store.ensure_file_present("abc", 100).await.unwrap();
        store.put_metadata("abc", MetadataKind::PieceStatus, &[1, 0]);

        let err = LocalTorrent::open(store, create_test_meta_info())
            .await
            .unwrap_err();

        assert!(matches!(err, TorrentError::InvalidPieceStatus { .. }));
    }

    #[tokio::test]
    async fn test_torrent_shares_store() {
        let store = Arc::new(InMemoryStore::new());
        store.ensure_file_present("abc", 100).await.unwrap();

        let torrent = LocalTorrent::open(Arc::clone(&store), create_test_meta_info())
            .await
            .unwrap();

        assert!(Arc::ptr_eq(torrent.store(), &store));
    }
}
