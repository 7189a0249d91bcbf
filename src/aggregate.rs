//! Corpus-wide vocabularies and the orphaned-media set, persisted to the cache store.
//!
//! Every entry is a JSON array of strings, sorted ascending and unique, stored under a fixed
//! key:
//!
//! | key | contents |
//! |-----|----------|
//! | `tags` | every tag on any record |
//! | `collections` | every non-empty collection |
//! | `folders` | every folder segment |
//! | `folder_paths` | every folder-path prefix (`a`, `a/b`, ...) |
//! | `file_paths` | every document key |
//! | `orphaned_media` | media documents nothing links to |
//! | `bucket:<name>` | every value of one configured bucket |
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    context::IndexContext,
    diagnostic::SyncDiagnostic,
    error::BuildonomyError,
    paths::folder_prefixes_of,
    properties::MetadataRecord,
};

pub const TAGS_KEY: &str = "tags";
pub const COLLECTIONS_KEY: &str = "collections";
pub const FOLDERS_KEY: &str = "folders";
pub const FOLDER_PATHS_KEY: &str = "folder_paths";
pub const FILE_PATHS_KEY: &str = "file_paths";
pub const ORPHANED_MEDIA_KEY: &str = "orphaned_media";
pub const BUCKET_KEY_PREFIX: &str = "bucket:";

pub fn bucket_key(bucket: &str) -> String {
    format!("{BUCKET_KEY_PREFIX}{bucket}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateIndex {
    pub tags: BTreeSet<String>,
    pub collections: BTreeSet<String>,
    pub folders: BTreeSet<String>,
    pub folder_paths: BTreeSet<String>,
    pub file_paths: BTreeSet<String>,
    pub orphaned_media: BTreeSet<String>,
    pub buckets: BTreeMap<String, BTreeSet<String>>,
    /// Records that could not be read and were left out.
    #[serde(skip)]
    pub diagnostics: Vec<SyncDiagnostic>,
}

impl AggregateIndex {
    /// `(cache key, sorted values)` for every entry.
    pub fn entries(&self) -> Vec<(String, Vec<String>)> {
        let sorted = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>();
        let mut entries = vec![
            (TAGS_KEY.to_string(), sorted(&self.tags)),
            (COLLECTIONS_KEY.to_string(), sorted(&self.collections)),
            (FOLDERS_KEY.to_string(), sorted(&self.folders)),
            (FOLDER_PATHS_KEY.to_string(), sorted(&self.folder_paths)),
            (FILE_PATHS_KEY.to_string(), sorted(&self.file_paths)),
            (ORPHANED_MEDIA_KEY.to_string(), sorted(&self.orphaned_media)),
        ];
        for (bucket, values) in self.buckets.iter() {
            entries.push((bucket_key(bucket), sorted(values)));
        }
        entries
    }

    fn add_record(&mut self, record: &MetadataRecord) {
        self.tags.extend(record.tags.iter().cloned());
        if !record.collection.is_empty() {
            self.collections.insert(record.collection.clone());
        }
        self.folders.extend(record.folders.iter().cloned());
        self.folder_paths.extend(folder_prefixes_of(&record.path));
        for (bucket, values) in self.buckets.iter_mut() {
            if let Some(record_values) = record.buckets.get(bucket) {
                values.extend(record_values.iter().cloned());
            }
        }
    }
}

pub struct AggregateCacheBuilder<'a> {
    ctx: &'a IndexContext,
}

impl<'a> AggregateCacheBuilder<'a> {
    pub fn new(ctx: &'a IndexContext) -> Self {
        AggregateCacheBuilder { ctx }
    }

    /// Scan every record and document, rebuild every aggregate, and persist them.
    #[tracing::instrument(skip(self))]
    pub fn collect_all(&self) -> Result<AggregateIndex, BuildonomyError> {
        let _cache = self.ctx.cache_gate();
        self.collect_locked()
    }

    fn collect_locked(&self) -> Result<AggregateIndex, BuildonomyError> {
        let mut index = AggregateIndex {
            buckets: self
                .ctx
                .config()
                .buckets
                .iter()
                .map(|bucket| (bucket.clone(), BTreeSet::new()))
                .collect(),
            ..Default::default()
        };
        let documents = self
            .ctx
            .content()
            .list()?
            .into_iter()
            .map(|entry| self.ctx.normalize(&entry.path))
            .filter(|key| !key.is_empty())
            .collect::<BTreeSet<_>>();

        for key in self.ctx.records().keys()? {
            match self.ctx.records().get_strict(&key) {
                Ok(Some(record)) => {
                    index.add_record(&record);
                    if documents.contains(&key)
                        && self.ctx.is_media(&key)
                        && record.links_to_here.is_empty()
                    {
                        index.orphaned_media.insert(key.clone());
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("[AggregateCacheBuilder::collect_all] Skipping '{}': {}", key, e);
                    index.diagnostics.push(SyncDiagnostic::skipped(&key, e));
                }
            }
        }
        for key in documents.iter() {
            if !self.ctx.records().contains(key)? {
                // Nothing has ever linked to an unindexed document
                if self.ctx.is_media(key) {
                    index.orphaned_media.insert(key.clone());
                }
                index.folder_paths.extend(folder_prefixes_of(key));
            }
        }
        index.file_paths = documents;

        for (key, values) in index.entries() {
            self.ctx.cache().set(&key, &serde_json::to_vec(&values)?)?;
        }
        tracing::info!(
            "[AggregateCacheBuilder::collect_all] {} files, {} tags, {} orphaned media",
            index.file_paths.len(),
            index.tags.len(),
            index.orphaned_media.len()
        );
        Ok(index)
    }

    /// Read one cached entry back. Unreadable entries are logged and reported as absent.
    pub fn cached(&self, key: &str) -> Result<Option<Vec<String>>, BuildonomyError> {
        let Some(bytes) = self.ctx.cache().get(key)? else {
            return Ok(None);
        };
        match serde_json::from_slice::<Vec<String>>(&bytes) {
            Ok(values) => Ok(Some(values)),
            Err(e) => {
                tracing::warn!(
                    "[AggregateCacheBuilder::cached] Malformed cache entry '{}': {}",
                    key,
                    e
                );
                Ok(None)
            }
        }
    }

    /// Re-evaluate orphan status of the media `doc` links to, the media in `removed_targets`
    /// (links the last save dropped), and `doc` itself, then persist the updated set.
    ///
    /// Falls back to [Self::collect_all] when the cached set is missing, empty, or unreadable.
    #[tracing::instrument(skip(self))]
    pub fn update_orphaned_media_for(
        &self,
        doc: &str,
        removed_targets: &[String],
    ) -> Result<BTreeSet<String>, BuildonomyError> {
        let _cache = self.ctx.cache_gate();
        let mut orphans = match self.cached(ORPHANED_MEDIA_KEY)? {
            Some(values) if !values.is_empty() => values.into_iter().collect::<BTreeSet<_>>(),
            _ => {
                tracing::debug!(
                    "[AggregateCacheBuilder::update_orphaned_media_for] No usable cached set, collecting all"
                );
                return Ok(self.collect_locked()?.orphaned_media);
            }
        };

        let key = self.ctx.normalize(doc);
        let used_links = self
            .ctx
            .records()
            .get(&key)?
            .map(|record| record.used_links)
            .unwrap_or_default();
        let candidates = used_links
            .iter()
            .chain(removed_targets.iter())
            .chain(std::iter::once(&key))
            .filter(|target| self.ctx.is_media(target))
            .collect::<BTreeSet<_>>();
        for target in candidates {
            let linked = self
                .ctx
                .records()
                .get(target)?
                .map(|record| !record.links_to_here.is_empty())
                .unwrap_or(false);
            if !linked && self.ctx.content().exists(target) {
                orphans.insert(target.clone());
            } else {
                orphans.remove(target.as_str());
            }
        }
        let values = orphans.iter().cloned().collect::<Vec<_>>();
        self.ctx
            .cache()
            .set(ORPHANED_MEDIA_KEY, &serde_json::to_vec(&values)?)?;
        Ok(orphans)
    }
}
