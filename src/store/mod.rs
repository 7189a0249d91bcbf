//! Storage collaborators and the typed record layer on top of them.
//!
//! The engine only ever talks to three narrow traits:
//!
//! - [`ContentSource`]: raw document bytes plus filesystem facts and corpus enumeration
//! - [`MetadataStore`]: per-document metadata blobs keyed by canonical path
//! - [`CacheStore`]: aggregate index blobs keyed by a fixed cache key
//!
//! [`RecordStore`] wraps a [`MetadataStore`] and exposes the two distinct save modes the
//! synchronizer relies on: [`RecordStore::save_computed`] for a record produced by the full
//! pipeline, and [`RecordStore::patch`] for direct edits to a neighbour's relationship lists.
//!
//! Two implementations ship with the crate: [`memory`] (tests, embedding) and [`fs`] (a plain
//! directory tree with one JSON file per key).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    config::IndexConfig,
    error::BuildonomyError,
    properties::{FileStat, MetadataRecord, RelationField},
};

pub mod fs;
pub mod memory;

pub use fs::{FsContent, FsKv};
pub use memory::{MemoryContent, MemoryKv};

/// One entry of the corpus enumeration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub name: String,
    pub path: String,
}

pub trait ContentSource: Send + Sync {
    /// Fails with [BuildonomyError::NotFound] when the document does not exist.
    fn read(&self, key: &str) -> Result<Vec<u8>, BuildonomyError>;

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), BuildonomyError>;

    fn stat(&self, key: &str) -> Result<FileStat, BuildonomyError>;

    /// Every document in the corpus, media included.
    fn list(&self) -> Result<Vec<DocumentEntry>, BuildonomyError>;

    fn rename(&self, from: &str, to: &str) -> Result<(), BuildonomyError>;

    fn remove(&self, key: &str) -> Result<(), BuildonomyError>;

    fn exists(&self, key: &str) -> bool {
        self.stat(key).is_ok()
    }
}

pub trait MetadataStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BuildonomyError>;

    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), BuildonomyError>;

    fn delete(&self, key: &str) -> Result<(), BuildonomyError>;

    /// Keys starting with `prefix`, in ascending order.
    fn list(&self, prefix: &str) -> Result<Vec<String>, BuildonomyError>;
}

pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BuildonomyError>;

    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), BuildonomyError>;
}

/// A single edit to one relationship list of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationPatch {
    /// Append `member` unless already present.
    Add(RelationField, String),
    Remove(RelationField, String),
    /// Rewrite `from` to `to` in place, dropping the result if `to` is already present.
    Replace(RelationField, String, String),
    /// Overwrite the whole list.
    Set(RelationField, Vec<String>),
}

impl RelationPatch {
    /// Apply to `record`, returning whether anything changed.
    pub fn apply(&self, record: &mut MetadataRecord) -> bool {
        match self {
            RelationPatch::Add(field, member) => {
                let list = record.relation_mut(*field);
                if list.contains(member) {
                    false
                } else {
                    list.push(member.clone());
                    true
                }
            }
            RelationPatch::Remove(field, member) => {
                let list = record.relation_mut(*field);
                let before = list.len();
                list.retain(|existing| existing != member);
                list.len() != before
            }
            RelationPatch::Replace(field, from, to) => {
                if from == to {
                    return false;
                }
                let list = record.relation_mut(*field);
                let Some(idx) = list.iter().position(|existing| existing == from) else {
                    return false;
                };
                if list.contains(to) {
                    list.remove(idx);
                } else {
                    list[idx] = to.clone();
                }
                true
            }
            RelationPatch::Set(field, members) => {
                let list = record.relation_mut(*field);
                if list == members {
                    false
                } else {
                    *list = members.clone();
                    true
                }
            }
        }
    }
}

/// What a patch save does when the neighbour has no record yet.
#[derive(Debug, Clone, Copy)]
pub enum IfMissing<'a> {
    Skip,
    /// Create a placeholder record with configured defaults, then patch it.
    Create(&'a IndexConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    Created,
    Unchanged,
    Missing,
}

/// Typed access to metadata records.
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<dyn MetadataStore>,
}

impl RecordStore {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Self {
        RecordStore { inner }
    }

    /// Load the record for `key`.
    ///
    /// An absent key is `Ok(None)`. A stored blob that no longer decodes is logged and also
    /// reported as `Ok(None)`, so one corrupt record never blocks a sweep; the next computed
    /// save for that key overwrites it.
    pub fn get(&self, key: &str) -> Result<Option<MetadataRecord>, BuildonomyError> {
        let Some(bytes) = self.inner.get(key)? else {
            return Ok(None);
        };
        match MetadataRecord::try_from(&bytes[..]) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(
                    "[RecordStore::get] Malformed record for '{}', treating as absent: {}",
                    key,
                    e
                );
                Ok(None)
            }
        }
    }

    /// Like [Self::get] but reports malformed data instead of hiding it.
    pub fn get_strict(&self, key: &str) -> Result<Option<MetadataRecord>, BuildonomyError> {
        match self.inner.get(key)? {
            Some(bytes) => Ok(Some(MetadataRecord::try_from(&bytes[..])?)),
            None => Ok(None),
        }
    }

    /// Persist a record produced by the full computed pipeline.
    pub fn save_computed(&self, record: &MetadataRecord) -> Result<(), BuildonomyError> {
        tracing::debug!("[RecordStore::save_computed] {}", record.path);
        self.inner.set(&record.path, &record.to_bytes()?)
    }

    /// Write relationship-list edits directly to the record at `key`, without recomputing
    /// anything else on it.
    pub fn patch(
        &self,
        key: &str,
        patches: &[RelationPatch],
        if_missing: IfMissing<'_>,
    ) -> Result<PatchOutcome, BuildonomyError> {
        let (mut record, created) = match (self.get(key)?, if_missing) {
            (Some(record), _) => (record, false),
            (None, IfMissing::Skip) => {
                tracing::debug!("[RecordStore::patch] No record for '{}', skipping", key);
                return Ok(PatchOutcome::Missing);
            }
            (None, IfMissing::Create(config)) => {
                let mut record = MetadataRecord::placeholder(key);
                record.apply_defaults(config);
                (record, true)
            }
        };
        let mut changed = false;
        for patch in patches {
            changed |= patch.apply(&mut record);
        }
        if !changed && !created {
            return Ok(PatchOutcome::Unchanged);
        }
        tracing::debug!("[RecordStore::patch] {} <- {:?}", key, patches);
        self.inner.set(key, &record.to_bytes()?)?;
        Ok(if created {
            PatchOutcome::Created
        } else {
            PatchOutcome::Applied
        })
    }

    pub fn delete(&self, key: &str) -> Result<(), BuildonomyError> {
        self.inner.delete(key)
    }

    pub fn keys(&self) -> Result<Vec<String>, BuildonomyError> {
        self.inner.list("")
    }

    pub fn contains(&self, key: &str) -> Result<bool, BuildonomyError> {
        Ok(self.inner.get(key)?.is_some())
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").finish_non_exhaustive()
    }
}
