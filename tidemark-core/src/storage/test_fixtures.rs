//! Test fixtures for storage testing.
//!
//! Provides standardized tiered storage setup for consistent testing
//! across storage and archive modules.

use super::TieredFileStore;

// Type alias for complex return type
type TempStoreDirs = (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf);

/// Creates temporary download and cache directories.
///
/// # Panics
///
/// Panics if temporary directory creation fails or if subdirectories cannot be created.
/// This is acceptable in test fixtures where failures indicate environment issues.
pub fn create_temp_store_dirs() -> TempStoreDirs {
    let temp_dir = tempfile::tempdir().unwrap();
    let download_dir = temp_dir.path().join("download");
    let cache_dir = temp_dir.path().join("cache");

    std::fs::create_dir_all(&download_dir).unwrap();
    std::fs::create_dir_all(&cache_dir).unwrap();

    (temp_dir, download_dir, cache_dir)
}

/// Creates a tiered store rooted in a fresh temporary directory.
///
/// The returned `TempDir` must outlive the store.
///
/// # Panics
///
/// Panics if temporary directory creation fails.
pub fn create_temp_store() -> (tempfile::TempDir, TieredFileStore) {
    let (temp_dir, download_dir, cache_dir) = create_temp_store_dirs();
    (temp_dir, TieredFileStore::new(download_dir, cache_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_store_dirs() {
        let (_temp_dir, download, cache) = create_temp_store_dirs();

        assert!(download.is_dir());
        assert!(cache.is_dir());
        assert_ne!(download, cache);
    }
}
