//! In-memory metadata store for tests and simulation.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{MetadataKind, MetadataStore, StorageError};

#[derive(Debug, Default)]
struct MemoryState {
    metadata: HashMap<(String, MetadataKind), Vec<u8>>,
    files: HashMap<String, u64>,
}

/// Process-local store with a single logical tier.
///
/// Each operation holds one lock for its full duration, which gives the
/// same insert-if-absent guarantees the filesystem store derives from
/// atomic links. Metadata slots do not require a backing file.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a metadata slot unconditionally.
    ///
    /// Bypasses get-or-set semantics so tests can seed or corrupt state.
    pub fn put_metadata(&self, name: &str, kind: MetadataKind, bytes: &[u8]) {
        self.state
            .lock()
            .metadata
            .insert((name.to_string(), kind), bytes.to_vec());
    }

    /// Returns whether a backing file exists for `name`.
    pub fn has_file(&self, name: &str) -> bool {
        self.state.lock().files.contains_key(name)
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn get_metadata(&self, name: &str, kind: MetadataKind) -> Result<Vec<u8>, StorageError> {
        self.state
            .lock()
            .metadata
            .get(&(name.to_string(), kind))
            .cloned()
            .ok_or_else(|| StorageError::MetadataNotFound {
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
        let mut state = self.state.lock();
        let committed = state
            .metadata
            .entry((name.to_string(), kind))
            .or_insert_with(|| bytes.to_vec());
        Ok(committed.clone())
    }

    async fn ensure_file_present(&self, name: &str, length: u64) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        let actual = *state.files.entry(name.to_string()).or_insert(length);
        if actual != length {
            return Err(StorageError::LengthMismatch {
                name: name.to_string(),
                expected: length,
                actual,
            });
        }
        Ok(())
    }

    async fn file_size(&self, name: &str) -> Result<u64, StorageError> {
        self.state
            .lock()
            .files
            .get(name)
            .copied()
            .ok_or_else(|| StorageError::FileNotFound {
                name: name.to_string(),
            })
    }

    async fn delete_file(&self, name: &str) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if state.files.remove(name).is_none() {
            return Err(StorageError::FileNotFound {
                name: name.to_string(),
            });
        }
        state.metadata.retain(|(entry, _), _| entry != name);
        Ok(())
    }
}
