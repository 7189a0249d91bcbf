//! Shared test utilities for engine scenario tests

use crate::{
    config::IndexConfig,
    error::BuildonomyError,
    properties::{FileStat, MetadataRecord},
    store::{ContentSource, DocumentEntry, MemoryContent, MemoryKv, MetadataStore},
    IndexContext,
};
use parking_lot::Mutex;
use std::{collections::BTreeSet, sync::Arc};

/// Initialize logging for tests
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A metadata store whose writes fail for selected keys.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryKv,
    fail_writes: Mutex<BTreeSet<String>>,
}

impl FailingStore {
    pub fn fail_writes_to(&self, key: &str) {
        self.fail_writes.lock().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.fail_writes.lock().clear();
    }
}

impl MetadataStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BuildonomyError> {
        MetadataStore::get(&self.inner, key)
    }

    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), BuildonomyError> {
        if self.fail_writes.lock().contains(key) {
            return Err(BuildonomyError::Io(format!("injected write failure for '{key}'")));
        }
        MetadataStore::set(&self.inner, key, bytes)
    }

    fn delete(&self, key: &str) -> Result<(), BuildonomyError> {
        MetadataStore::delete(&self.inner, key)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, BuildonomyError> {
        MetadataStore::list(&self.inner, prefix)
    }
}

/// Document content whose reads fail for selected keys. Listing and stat still see them.
#[derive(Debug)]
pub struct FailingContent {
    inner: Arc<MemoryContent>,
    fail_reads: Mutex<BTreeSet<String>>,
}

impl FailingContent {
    pub fn fail_reads_of(&self, key: &str) {
        self.fail_reads.lock().insert(key.to_string());
    }
}

impl ContentSource for FailingContent {
    fn read(&self, key: &str) -> Result<Vec<u8>, BuildonomyError> {
        if self.fail_reads.lock().contains(key) {
            return Err(BuildonomyError::Io(format!("injected read failure for '{key}'")));
        }
        self.inner.read(key)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), BuildonomyError> {
        self.inner.write(key, bytes)
    }

    fn stat(&self, key: &str) -> Result<FileStat, BuildonomyError> {
        self.inner.stat(key)
    }

    fn list(&self) -> Result<Vec<DocumentEntry>, BuildonomyError> {
        self.inner.list()
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), BuildonomyError> {
        self.inner.rename(from, to)
    }

    fn remove(&self, key: &str) -> Result<(), BuildonomyError> {
        self.inner.remove(key)
    }
}

/// An in-memory corpus with handles on every collaborator.
pub struct TestCorpus {
    pub content: Arc<MemoryContent>,
    pub reads: Arc<FailingContent>,
    pub metadata: Arc<FailingStore>,
    pub cache: Arc<MemoryKv>,
    pub ctx: IndexContext,
}

impl TestCorpus {
    pub fn new(docs: &[(&str, &str)]) -> Self {
        Self::with_config(docs, IndexConfig::default())
    }

    pub fn with_config(docs: &[(&str, &str)], config: IndexConfig) -> Self {
        let content = Arc::new(MemoryContent::with_documents(docs.iter().copied()));
        let reads = Arc::new(FailingContent {
            inner: content.clone(),
            fail_reads: Mutex::new(BTreeSet::new()),
        });
        let metadata = Arc::new(FailingStore::default());
        let cache = Arc::new(MemoryKv::default());
        let ctx = IndexContext::new(reads.clone(), metadata.clone(), cache.clone(), config);
        TestCorpus {
            content,
            reads,
            metadata,
            cache,
            ctx,
        }
    }

    /// The stored record for `key`; panics when absent.
    pub fn record(&self, key: &str) -> MetadataRecord {
        self.ctx
            .records()
            .get(key)
            .unwrap()
            .unwrap_or_else(|| panic!("no record for '{key}'"))
    }

    pub fn has_record(&self, key: &str) -> bool {
        self.ctx.records().contains(key).unwrap()
    }

    /// Panics with every violation when the stored graph is inconsistent.
    pub fn assert_consistent(&self) {
        let violations = self.ctx.built_in_test().unwrap();
        assert!(
            violations.is_empty(),
            "Graph should be consistent:\n{}",
            violations.join("\n")
        );
    }

    /// Panics when any stored ancestor list no longer matches its parent chain.
    pub fn assert_ancestors_fresh(&self) {
        let stale = self.ctx.stale_ancestors().unwrap();
        assert!(stale.is_empty(), "Ancestors should be fresh:\n{}", stale.join("\n"));
    }
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
