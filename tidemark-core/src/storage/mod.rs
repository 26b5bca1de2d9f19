//! Storage layer for torrent files and their metadata.
//!
//! Defines the download-or-cache storage interface consumed by the torrent
//! archive, with a tiered filesystem implementation and an in-memory
//! implementation for tests.

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
pub mod tiered;

use std::fmt;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemoryStore;
pub use tiered::TieredFileStore;

/// Kind of metadata slot attached to a stored file.
///
/// Each file name owns at most one slot of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    /// Serialized torrent metainfo
    TorrentMeta,
    /// One status byte per piece
    PieceStatus,
}

impl MetadataKind {
    /// Returns the stable on-disk identifier for this slot kind.
    pub fn as_str(self) -> &'static str {
        match self {
            MetadataKind::TorrentMeta => "torrentmeta",
            MetadataKind::PieceStatus => "status",
        }
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified download-or-cache view over tiered file storage.
///
/// Every read consults the download tier first and then the cache tier.
/// Writes never overwrite existing state: metadata is committed with
/// insert-if-absent semantics and file allocation is idempotent. These two
/// primitives are the only race-resolution mechanism callers rely on.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Reads the metadata slot of `kind` for `name`.
    ///
    /// # Errors
    ///
    /// - `StorageError::MetadataNotFound` - If the slot was never written
    /// - `StorageError::Io` - If file system operation failed
    async fn get_metadata(&self, name: &str, kind: MetadataKind) -> Result<Vec<u8>, StorageError>;

    /// Writes `bytes` into the slot unless it already holds a value.
    ///
    /// Returns the bytes now in effect, which are another writer's bytes
    /// whenever that writer committed first.
    ///
    /// # Errors
    ///
    /// - `StorageError::FileNotFound` - If the store requires a backing file and none exists
    /// - `StorageError::Io` - If file system operation failed
    async fn get_or_set_metadata(
        &self,
        name: &str,
        kind: MetadataKind,
        bytes: &[u8],
    ) -> Result<Vec<u8>, StorageError>;

    /// Allocates a backing file of `length` bytes unless one already exists.
    ///
    /// # Errors
    ///
    /// - `StorageError::LengthMismatch` - If an existing file has a different length
    /// - `StorageError::Io` - If file system operation failed
    async fn ensure_file_present(&self, name: &str, length: u64) -> Result<(), StorageError>;

    /// Returns the length of the backing file in whichever tier holds it.
    ///
    /// # Errors
    ///
    /// - `StorageError::FileNotFound` - If no tier holds the file
    /// - `StorageError::Io` - If file system operation failed
    async fn file_size(&self, name: &str) -> Result<u64, StorageError>;

    /// Deletes the backing file from whichever tier holds it.
    ///
    /// # Errors
    ///
    /// - `StorageError::FileNotFound` - If no tier holds the file
    /// - `StorageError::Io` - If file system operation failed
    async fn delete_file(&self, name: &str) -> Result<(), StorageError>;
}

/// Errors that occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Metadata slot was never written for this file
    #[error("{kind} metadata for {name} does not exist")]
    MetadataNotFound {
        /// File name the slot belongs to
        name: String,
        /// Kind of the missing slot
        kind: MetadataKind,
    },

    /// Neither tier holds the file
    #[error("file {name} does not exist")]
    FileNotFound {
        /// Name of the missing file
        name: String,
    },

    /// File exists with a length other than the requested one
    #[error("file {name} has length {actual}, expected {expected}")]
    LengthMismatch {
        /// Name of the conflicting file
        name: String,
        /// Requested length
        expected: u64,
        /// Length found on disk
        actual: u64,
    },

    /// Name cannot be mapped onto a tier entry
    #[error("invalid file name: {name:?}")]
    InvalidName {
        /// Rejected name
        name: String,
    },

    /// Standard I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Checks whether the error reports absence of a file or metadata slot.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::MetadataNotFound { .. } | StorageError::FileNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_kind_names() {
        assert_eq!(MetadataKind::TorrentMeta.to_string(), "torrentmeta");
        assert_eq!(MetadataKind::PieceStatus.to_string(), "status");
    }

    #[test]
    fn test_not_found_classification() {
        let missing = StorageError::FileNotFound {
            name: "abc".to_string(),
        };
        assert!(missing.is_not_found());

        let io = StorageError::Io(std::io::Error::other("disk on fire"));
        assert!(!io.is_not_found());
    }
}
