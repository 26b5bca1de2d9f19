//! Filesystem storage with a download tier and a cache tier.
//!
//! Each file lives in its own entry directory inside exactly one tier:
//! `{tier}/{name}/data` holds the content and `{tier}/{name}/_{kind}` holds
//! each metadata slot. New entries are always allocated in the download tier.

use std::future::Future;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{MetadataKind, MetadataStore, StorageError};

const DATA_FILE: &str = "data";

/// Tiered file store presenting a download-or-cache view.
///
/// Commits use a private temp file published with `hard_link`, which fails
/// atomically when the target already exists. That makes metadata writes
/// first-writer-wins and file allocation idempotent even across processes.
#[derive(Debug, Clone)]
pub struct TieredFileStore {
    download_dir: PathBuf,
    cache_dir: PathBuf,
}

impl TieredFileStore {
    /// Creates a store over the given download and cache directories.
    ///
    /// Directories are created lazily on first write.
    pub fn new(download_dir: PathBuf, cache_dir: PathBuf) -> Self {
        Self {
            download_dir,
            cache_dir,
        }
    }

    /// Returns the download tier directory.
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Returns the cache tier directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Moves an entry from the download tier into the cache tier.
    ///
    /// Metadata slots travel with the file.
    ///
    /// # Errors
    ///
    /// - `StorageError::FileNotFound` - If the download tier does not hold the file
    /// - `StorageError::Io` - If the rename failed, e.g. the cache already holds the entry
    pub async fn move_to_cache(&self, name: &str) -> Result<(), StorageError> {
        validate_name(name)?;
        let source = self.download_dir.join(name);
        if !fs::try_exists(source.join(DATA_FILE)).await? {
            return Err(StorageError::FileNotFound {
                name: name.to_string(),
            });
        }

        fs::create_dir_all(&self.cache_dir).await?;
        fs::rename(&source, self.cache_dir.join(name)).await?;
        tracing::debug!(name, "moved file from download tier to cache tier");
        Ok(())
    }

    fn tiers(&self) -> [&Path; 2] {
        [&self.download_dir, &self.cache_dir]
    }

    /// Finds the entry directory of the tier that holds the file.
    async fn locate(&self, name: &str) -> Result<Option<PathBuf>, StorageError> {
        validate_name(name)?;
        for tier in self.tiers() {
            let entry = tier.join(name);
            if fs::try_exists(entry.join(DATA_FILE)).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    async fn require_entry(&self, name: &str) -> Result<PathBuf, StorageError> {
        self.locate(name)
            .await?
            .ok_or_else(|| StorageError::FileNotFound {
                name: name.to_string(),
            })
    }
}

#[async_trait]
impl MetadataStore for TieredFileStore {
    async fn get_metadata(&self, name: &str, kind: MetadataKind) -> Result<Vec<u8>, StorageError> {
        validate_name(name)?;
        for tier in self.tiers() {
            match fs::read(metadata_path(&tier.join(name), kind)).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(StorageError::MetadataNotFound {
            name: name.to_string(),
            kind,
        })
    }

    async fn get_or_set_metadata(
        &self,
        name: &str,
        kind: MetadataKind,
        bytes: &[u8],
    ) -> Result<Vec<u8>, StorageError> {
        let entry = self.require_entry(name).await?;
        let target = metadata_path(&entry, kind);

        let published =
            link_from_temp(&entry, &target, |temp| async move { fs::write(temp, bytes).await })
                .await;

        match published {
            Ok(()) => Ok(bytes.to_vec()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(name, %kind, "metadata already committed by another writer");
                Ok(fs::read(&target).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_file_present(&self, name: &str, length: u64) -> Result<(), StorageError> {
        if let Some(entry) = self.locate(name).await? {
            return check_length(name, &entry.join(DATA_FILE), length).await;
        }

        let entry = self.download_dir.join(name);
        fs::create_dir_all(&entry).await?;

        let target = entry.join(DATA_FILE);
        let published = link_from_temp(&entry, &target, |temp| async move {
            let file = fs::File::create(temp).await?;
            file.set_len(length).await
        })
        .await;

        match published {
            Ok(()) => {
                tracing::debug!(name, length, "allocated download file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                check_length(name, &target, length).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn file_size(&self, name: &str) -> Result<u64, StorageError> {
        let entry = self.require_entry(name).await?;
        Ok(fs::metadata(entry.join(DATA_FILE)).await?.len())
    }

    async fn delete_file(&self, name: &str) -> Result<(), StorageError> {
        let entry = self.require_entry(name).await?;
        match fs::remove_dir_all(&entry).await {
            Ok(()) => {
                tracing::debug!(name, path = %entry.display(), "deleted file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::FileNotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Rejects names that would escape the tier directory.
fn validate_name(name: &str) -> Result<(), StorageError> {
    let escapes = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.starts_with(".tmp-");
    if escapes {
        return Err(StorageError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn metadata_path(entry: &Path, kind: MetadataKind) -> PathBuf {
    entry.join(format!("_{}", kind.as_str()))
}

fn temp_path(entry: &Path) -> PathBuf {
    entry.join(format!(".tmp-{}", uuid::Uuid::new_v4()))
}

/// Fills a private temp file in `entry` and hard-links it to `target`.
///
/// The temp file is removed whatever the outcome. A failed removal is logged
/// and does not change the result.
async fn link_from_temp<F, Fut>(entry: &Path, target: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let temp = temp_path(entry);
    let result = match fill(temp.clone()).await {
        Ok(()) => fs::hard_link(&temp, target).await,
        Err(e) => Err(e),
    };

    match fs::remove_file(&temp).await {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            tracing::warn!(path = %temp.display(), error = %e, "failed to remove temp file");
        }
        _ => {}
    }
    result
}

async fn check_length(name: &str, path: &Path, expected: u64) -> Result<(), StorageError> {
    let actual = fs::metadata(path).await?.len();
    if actual != expected {
        return Err(StorageError::LengthMismatch {
            name: name.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::test_fixtures::create_temp_store;

    fn temp_files(entry: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(entry)
            .unwrap()
            .map(|dirent| dirent.unwrap().path())
            .filter(|path| path.file_name().unwrap().to_string_lossy().starts_with(".tmp-"))
            .collect()
    }

    #[tokio::test]
    async fn test_ensure_file_present_allocates_in_download_tier() {
        let (_temp_dir, store) = create_temp_store();

        store.ensure_file_present("abc", 1024).await.unwrap();

        let data = store.download_dir().join("abc").join(DATA_FILE);
        assert_eq!(std::fs::metadata(data).unwrap().len(), 1024);
        assert_eq!(store.file_size("abc").await.unwrap(), 1024);
    }

    #[tokio::test]
    async fn test_ensure_file_present_is_idempotent() {
        let (_temp_dir, store) = create_temp_store();

        store.ensure_file_present("abc", 16).await.unwrap();
        store.ensure_file_present("abc", 16).await.unwrap();

        let err = store.ensure_file_present("abc", 17).await.unwrap_err();
        assert!(matches!(err, StorageError::LengthMismatch { actual: 16, .. }));
    }

    #[tokio::test]
    async fn test_get_or_set_requires_file() {
        let (_temp_dir, store) = create_temp_store();

        let err = store
            .get_or_set_metadata("abc", MetadataKind::TorrentMeta, b"meta")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_or_set_is_first_writer_wins() {
        let (_temp_dir, store) = create_temp_store();
        store.ensure_file_present("abc", 8).await.unwrap();

        let first = store
            .get_or_set_metadata("abc", MetadataKind::TorrentMeta, b"first")
            .await
            .unwrap();
        let second = store
            .get_or_set_metadata("abc", MetadataKind::TorrentMeta, b"second")
            .await
            .unwrap();

        assert_eq!(first, b"first");
        assert_eq!(second, b"first");
        assert_eq!(
            store
                .get_metadata("abc", MetadataKind::TorrentMeta)
                .await
                .unwrap(),
            b"first"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_set_converges() {
        let (_temp_dir, store) = create_temp_store();
        let store = Arc::new(store);
        store.ensure_file_present("abc", 8).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                let bytes = format!("writer-{i}");
                store
                    .get_or_set_metadata("abc", MetadataKind::TorrentMeta, bytes.as_bytes())
                    .await
                    .unwrap()
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
        assert!(temp_files(&store.download_dir().join("abc")).is_empty());
    }

    #[tokio::test]
    async fn test_failed_fill_removes_temp_file() {
        let (_temp_dir, store) = create_temp_store();
        let entry = store.download_dir().join("abc");
        std::fs::create_dir_all(&entry).unwrap();
        let target = entry.join(DATA_FILE);

        let err = link_from_temp(&entry, &target, |temp| async move {
            fs::write(temp, b"partial").await?;
            Err::<(), _>(io::Error::other("disk full"))
        })
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "disk full");
        assert!(!target.exists());
        assert!(temp_files(&entry).is_empty());
    }

    #[tokio::test]
    async fn test_lost_link_race_removes_temp_file() {
        let (_temp_dir, store) = create_temp_store();
        store.ensure_file_present("abc", 8).await.unwrap();
        let entry = store.download_dir().join("abc");

        let err = link_from_temp(&entry, &entry.join(DATA_FILE), |temp| async move {
            fs::write(temp, b"late").await
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert!(temp_files(&entry).is_empty());
        assert_eq!(store.file_size("abc").await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_cache_tier_is_visible_after_move() {
        let (_temp_dir, store) = create_temp_store();
        store.ensure_file_present("abc", 32).await.unwrap();
        store
            .get_or_set_metadata("abc", MetadataKind::TorrentMeta, b"meta")
            .await
            .unwrap();

        store.move_to_cache("abc").await.unwrap();

        assert!(!store.download_dir().join("abc").exists());
        assert_eq!(store.file_size("abc").await.unwrap(), 32);
        assert_eq!(
            store
                .get_metadata("abc", MetadataKind::TorrentMeta)
                .await
                .unwrap(),
            b"meta"
        );

        // Present in cache, so no second allocation happens in download.
        store.ensure_file_present("abc", 32).await.unwrap();
        assert!(!store.download_dir().join("abc").exists());
    }

    #[tokio::test]
    async fn test_delete_removes_entry_from_either_tier() {
        let (_temp_dir, store) = create_temp_store();
        store.ensure_file_present("cached", 4).await.unwrap();
        store.move_to_cache("cached").await.unwrap();
        store.ensure_file_present("downloading", 4).await.unwrap();

        store.delete_file("cached").await.unwrap();
        store.delete_file("downloading").await.unwrap();

        assert!(store.delete_file("cached").await.unwrap_err().is_not_found());
        assert!(
            store
                .get_metadata("cached", MetadataKind::TorrentMeta)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_rejects_path_escaping_names() {
        let (_temp_dir, store) = create_temp_store();

        for name in ["", "..", "a/b", ".tmp-x"] {
            let err = store.ensure_file_present(name, 1).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidName { .. }), "{name}");
        }
    }
}
