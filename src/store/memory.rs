//! In-memory collaborators. Used by the test suite and by embedders that keep their own
//! persistence.
use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicI64, Ordering},
};

use super::{CacheStore, ContentSource, DocumentEntry, MetadataStore};
use crate::{
    error::BuildonomyError,
    paths::file_name,
    properties::FileStat,
};

/// Document contents held in a map. Timestamps come from a logical clock that ticks once per
/// write, so re-reading an unchanged document always reports the same stat.
#[derive(Debug)]
pub struct MemoryContent {
    files: RwLock<BTreeMap<String, (Vec<u8>, FileStat)>>,
    clock: AtomicI64,
}

impl Default for MemoryContent {
    fn default() -> Self {
        MemoryContent {
            files: RwLock::new(BTreeMap::new()),
            clock: AtomicI64::new(1_700_000_000),
        }
    }
}

impl MemoryContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, content)` pairs.
    pub fn with_documents<I, K, C>(docs: I) -> Self
    where
        I: IntoIterator<Item = (K, C)>,
        K: AsRef<str>,
        C: AsRef<[u8]>,
    {
        let content = MemoryContent::default();
        for (key, body) in docs {
            // Writes to a map cannot fail
            let _ = content.write(key.as_ref(), body.as_ref());
        }
        content
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn read_string(&self, key: &str) -> Result<String, BuildonomyError> {
        Ok(String::from_utf8_lossy(&self.read(key)?).into_owned())
    }
}

impl ContentSource for MemoryContent {
    fn read(&self, key: &str) -> Result<Vec<u8>, BuildonomyError> {
        self.files
            .read()
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| BuildonomyError::NotFound(format!("document '{key}'")))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), BuildonomyError> {
        let now = self.tick();
        let mut files = self.files.write();
        let created = files.get(key).map(|(_, stat)| stat.created).unwrap_or(now);
        files.insert(
            key.to_string(),
            (
                bytes.to_vec(),
                FileStat {
                    size: bytes.len() as u64,
                    created,
                    modified: now,
                },
            ),
        );
        Ok(())
    }

    fn stat(&self, key: &str) -> Result<FileStat, BuildonomyError> {
        self.files
            .read()
            .get(key)
            .map(|(_, stat)| *stat)
            .ok_or_else(|| BuildonomyError::NotFound(format!("document '{key}'")))
    }

    fn list(&self) -> Result<Vec<DocumentEntry>, BuildonomyError> {
        Ok(self
            .files
            .read()
            .keys()
            .map(|key| DocumentEntry {
                name: file_name(key).to_string(),
                path: key.clone(),
            })
            .collect())
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), BuildonomyError> {
        let mut files = self.files.write();
        let entry = files
            .remove(from)
            .ok_or_else(|| BuildonomyError::NotFound(format!("document '{from}'")))?;
        files.insert(to.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BuildonomyError> {
        self.files
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BuildonomyError::NotFound(format!("document '{key}'")))
    }
}

/// A key-value map usable as either the metadata store or the cache store.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl MetadataStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BuildonomyError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), BuildonomyError> {
        self.entries.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), BuildonomyError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, BuildonomyError> {
        Ok(self
            .entries
            .read()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

impl CacheStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BuildonomyError> {
        MetadataStore::get(self, key)
    }

    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), BuildonomyError> {
        MetadataStore::set(self, key, bytes)
    }
}
