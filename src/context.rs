//! The service object every engine component works through.
use parking_lot::{Mutex, MutexGuard, ReentrantMutex, ReentrantMutexGuard};
use std::{path::Path, sync::Arc};

use crate::{
    aggregate::{AggregateCacheBuilder, AggregateIndex},
    check::InvariantChecker,
    codec::{ExtractorMap, LinkPipeline},
    config::{IndexConfig, TomlConfigProvider},
    error::BuildonomyError,
    lifecycle::Lifecycle,
    paths::{extension, PathNormalizer},
    properties::EditedFields,
    rebuild::{RebuildCoordinator, RebuildReport},
    relocate::{MoveCoordinator, MoveReport},
    store::{CacheStore, ContentSource, FsContent, FsKv, MetadataStore, RecordStore},
    sync::{GraphSynchronizer, SaveOutcome},
    SyncDiagnostic,
};

/// Collaborator handles, configuration, and the locks serializing mutations.
///
/// Constructed once and shared by reference. Every mutating operation takes the re-entrant
/// writer gate, so a move may run nested computed saves while a concurrent save waits; the
/// aggregate cache has its own lock so cache refreshes do not block unrelated saves.
pub struct IndexContext {
    content: Arc<dyn ContentSource>,
    records: RecordStore,
    cache: Arc<dyn CacheStore>,
    extractors: ExtractorMap,
    config: IndexConfig,
    normalizer: PathNormalizer,
    pipeline: LinkPipeline,
    writer: ReentrantMutex<()>,
    cache_lock: Mutex<()>,
}

impl IndexContext {
    pub fn new(
        content: Arc<dyn ContentSource>,
        metadata: Arc<dyn MetadataStore>,
        cache: Arc<dyn CacheStore>,
        config: IndexConfig,
    ) -> Self {
        IndexContext {
            content,
            records: RecordStore::new(metadata),
            cache,
            extractors: ExtractorMap::create(),
            normalizer: config.normalizer(),
            pipeline: LinkPipeline::new(&config),
            config,
            writer: ReentrantMutex::new(()),
            cache_lock: Mutex::new(()),
        }
    }

    /// Replace the built-in extractor registry.
    pub fn with_extractors(mut self, extractors: ExtractorMap) -> Self {
        self.extractors = extractors;
        self
    }

    /// Context over a directory corpus: configuration from `noet-index.toml` at the root (or
    /// defaults), documents from the tree, records and cache entries under the configured
    /// dot-directories.
    pub fn for_root<P: AsRef<Path>>(root: P) -> Result<Self, BuildonomyError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(BuildonomyError::NotFound(format!(
                "corpus root {root:?} is not a directory"
            )));
        }
        let config = TomlConfigProvider::for_root(root).load()?;
        tracing::debug!("[IndexContext::for_root] {:?} with {:?}", root, config);
        let metadata = FsKv::new(root.join(&config.metadata_dir))?;
        let cache = FsKv::new(root.join(&config.cache_dir))?;
        Ok(IndexContext::new(
            Arc::new(FsContent::new(root)),
            Arc::new(metadata),
            Arc::new(cache),
            config,
        ))
    }

    pub fn content(&self) -> &dyn ContentSource {
        self.content.as_ref()
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn cache(&self) -> &dyn CacheStore {
        self.cache.as_ref()
    }

    pub fn extractors(&self) -> &ExtractorMap {
        &self.extractors
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &LinkPipeline {
        &self.pipeline
    }

    /// Canonical key for any document path.
    pub fn normalize(&self, path: &str) -> String {
        self.normalizer.normalize(path)
    }

    pub fn is_media(&self, key: &str) -> bool {
        self.config.is_media_extension(&extension(key))
    }

    /// Held for the duration of every mutation. Re-entrant on the same thread.
    pub fn write_gate(&self) -> ReentrantMutexGuard<'_, ()> {
        self.writer.lock()
    }

    pub(crate) fn cache_gate(&self) -> MutexGuard<'_, ()> {
        self.cache_lock.lock()
    }

    pub fn save(&self, path: &str, edits: &EditedFields) -> Result<SaveOutcome, BuildonomyError> {
        GraphSynchronizer::new(self).save(path, edits)
    }

    /// Computed save followed by the incremental orphaned-media update.
    pub fn save_and_index(
        &self,
        path: &str,
        edits: &EditedFields,
    ) -> Result<SaveOutcome, BuildonomyError> {
        let outcome = self.save(path, edits)?;
        AggregateCacheBuilder::new(self)
            .update_orphaned_media_for(&outcome.record.path, &outcome.links_removed)?;
        Ok(outcome)
    }

    pub fn rebuild_all(&self) -> Result<RebuildReport, BuildonomyError> {
        RebuildCoordinator::new(self).rebuild_all()
    }

    pub fn collect_all(&self) -> Result<AggregateIndex, BuildonomyError> {
        AggregateCacheBuilder::new(self).collect_all()
    }

    pub fn move_document(&self, from: &str, to: &str) -> Result<MoveReport, BuildonomyError> {
        MoveCoordinator::new(self).move_document(from, to)
    }

    pub fn initialize_all(&self) -> Result<usize, BuildonomyError> {
        Lifecycle::new(self).initialize_all()
    }

    pub fn remove_document(&self, path: &str) -> Result<Vec<SyncDiagnostic>, BuildonomyError> {
        Lifecycle::new(self).remove_document(path)
    }

    /// Every graph invariant violation currently in the store, as readable messages.
    pub fn built_in_test(&self) -> Result<Vec<String>, BuildonomyError> {
        InvariantChecker::new(self).built_in_test()
    }

    /// Records whose stored ancestors no longer match their parent chains.
    pub fn stale_ancestors(&self) -> Result<Vec<String>, BuildonomyError> {
        InvariantChecker::new(self).stale_ancestors()
    }
}

impl std::fmt::Debug for IndexContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexContext")
            .field("records", &self.records)
            .field("extractors", &self.extractors)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
