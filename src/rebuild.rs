//! Whole-corpus recomputation, used for first population and consistency repair.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    ancestors::AncestorResolver,
    context::IndexContext,
    diagnostic::SyncDiagnostic,
    error::BuildonomyError,
    paths::file_stem,
    properties::{clean_list, MetadataRecord},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Documents found in the corpus.
    pub documents: usize,
    /// Records persisted by the second pass.
    pub records_written: usize,
    /// Dangling records deleted because nothing refers to them any more.
    pub removed: usize,
    pub diagnostics: Vec<SyncDiagnostic>,
}

/// Recomputes every record in two passes.
///
/// Pass 1 recomputes each document's own view (AUTO fields, ancestors, used links) with its
/// reverse relations cleared. Pass 2 derives `kids` and `links_to_here` for every record from
/// the complete pass-1 snapshot, so no record is ever computed from a half-updated neighbour.
pub struct RebuildCoordinator<'a> {
    ctx: &'a IndexContext,
}

impl<'a> RebuildCoordinator<'a> {
    pub fn new(ctx: &'a IndexContext) -> Self {
        RebuildCoordinator { ctx }
    }

    #[tracing::instrument(skip(self))]
    pub fn rebuild_all(&self) -> Result<RebuildReport, BuildonomyError> {
        let _gate = self.ctx.write_gate();
        let mut report = RebuildReport::default();

        let documents = self
            .ctx
            .content()
            .list()?
            .into_iter()
            .map(|entry| self.ctx.normalize(&entry.path))
            .filter(|key| !key.is_empty())
            .collect::<BTreeSet<_>>();
        report.documents = documents.len();
        let stored = self.ctx.records().keys()?;

        // Dangling records lose their parents before any ancestor chain climbs through them
        let mut snapshot: BTreeMap<String, MetadataRecord> = BTreeMap::new();
        let mut dangling = BTreeSet::new();
        for key in stored.into_iter().filter(|key| !documents.contains(key)) {
            match self.ctx.records().get(&key) {
                Ok(Some(mut record)) => {
                    tracing::debug!(
                        "[RebuildCoordinator::rebuild_all] '{}' has no document, clearing its relations",
                        key
                    );
                    record.parents.clear();
                    record.clear_computed_relations();
                    if let Err(e) = self.ctx.records().save_computed(&record) {
                        report.diagnostics.push(SyncDiagnostic::skipped(&key, e));
                    }
                    snapshot.insert(key.clone(), record);
                    dangling.insert(key);
                }
                Ok(None) => {
                    report.diagnostics.push(SyncDiagnostic::MalformedRecord {
                        key: key.clone(),
                        message: "undecodable record without a document".to_string(),
                    });
                    dangling.insert(key);
                }
                Err(e) => report.diagnostics.push(SyncDiagnostic::skipped(&key, e)),
            }
        }

        // Pass 1
        for key in documents.iter() {
            match self.recompute_document(key, &mut report.diagnostics) {
                Ok(record) => {
                    snapshot.insert(key.clone(), record);
                }
                Err(e) => {
                    tracing::warn!("[RebuildCoordinator::rebuild_all] Skipping '{}': {}", key, e);
                    report.diagnostics.push(SyncDiagnostic::skipped(key, e));
                    // Keep what is stored so pass 2 only touches its reverse relations
                    if let Ok(Some(record)) = self.ctx.records().get(key) {
                        snapshot.insert(key.clone(), record);
                    }
                }
            }
        }
        tracing::info!(
            "[RebuildCoordinator::rebuild_all] Pass 1 complete: {} records ({} dangling)",
            snapshot.len(),
            dangling.len()
        );

        // Pass 2
        let mut kids_of: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        let mut linked_from: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (key, record) in snapshot.iter() {
            for parent in record.parents.iter() {
                kids_of.entry(parent.as_str()).or_default().push(key.clone());
            }
            for target in record.used_links.iter() {
                linked_from
                    .entry(target.as_str())
                    .or_default()
                    .push(key.clone());
            }
        }
        let all_keys = snapshot
            .keys()
            .map(String::as_str)
            .chain(kids_of.keys().copied())
            .chain(linked_from.keys().copied())
            .collect::<BTreeSet<_>>();
        for key in all_keys {
            let mut record = snapshot.get(key).cloned().unwrap_or_else(|| {
                let mut record = MetadataRecord::placeholder(key);
                record.apply_defaults(self.ctx.config());
                record
            });
            record.kids = kids_of.get(key).cloned().unwrap_or_default();
            record.links_to_here = linked_from.get(key).cloned().unwrap_or_default();
            let result = if dangling.contains(key)
                && record.kids.is_empty()
                && record.links_to_here.is_empty()
            {
                report.removed += 1;
                self.ctx.records().delete(key)
            } else {
                report.records_written += 1;
                self.ctx.records().save_computed(&record)
            };
            if let Err(e) = result {
                tracing::warn!("[RebuildCoordinator::rebuild_all] Pass 2 failed for '{}': {}", key, e);
                report.diagnostics.push(SyncDiagnostic::skipped(key, e));
            }
        }
        // Undecodable dangling records never made it into the snapshot
        for key in dangling.iter().filter(|key| !snapshot.contains_key(*key)) {
            if kids_of.contains_key(key.as_str()) || linked_from.contains_key(key.as_str()) {
                continue;
            }
            match self.ctx.records().delete(key) {
                Ok(()) => report.removed += 1,
                Err(e) => report.diagnostics.push(SyncDiagnostic::skipped(key, e)),
            }
        }

        tracing::info!(
            "[RebuildCoordinator::rebuild_all] Rebuilt {} documents: {} records written, {} removed, {} diagnostics",
            report.documents,
            report.records_written,
            report.removed,
            report.diagnostics.len()
        );
        Ok(report)
    }

    /// Pass-1 view of one document, persisted before returning.
    fn recompute_document(
        &self,
        key: &str,
        diagnostics: &mut Vec<SyncDiagnostic>,
    ) -> Result<MetadataRecord, BuildonomyError> {
        let stat = self.ctx.content().stat(key)?;
        let extractor = self.ctx.extractors().handler_for(key);
        let mut record = match self.ctx.records().get_strict(key) {
            Ok(Some(record)) => record,
            Ok(None) => MetadataRecord::placeholder(key),
            Err(BuildonomyError::Serialization(message)) => {
                tracing::warn!(
                    "[RebuildCoordinator::recompute_document] Malformed record for '{}', starting fresh",
                    key
                );
                diagnostics.push(SyncDiagnostic::MalformedRecord {
                    key: key.to_string(),
                    message,
                });
                MetadataRecord::placeholder(key)
            }
            Err(e) => return Err(e),
        };
        record.refresh_auto(key, &stat);
        record.apply_defaults(self.ctx.config());
        record.clear_computed_relations();
        let parents = record
            .parents
            .iter()
            .map(|parent| self.ctx.normalize(parent))
            .filter(|parent| !parent.is_empty() && parent != key)
            .collect::<Vec<_>>();
        record.parents = clean_list(&parents);

        let ancestry = AncestorResolver::new(self.ctx.records()).resolve(key, &record.parents)?;
        record.ancestors = ancestry.ancestors;
        diagnostics.extend(ancestry.diagnostics);

        record.title = file_stem(key).to_string();
        if let Some(extractor) = extractor {
            let bytes = self.ctx.content().read(key)?;
            record.used_links = self
                .ctx
                .pipeline()
                .extract(extractor.as_ref(), &bytes)
                .into_iter()
                .filter(|target| target != key)
                .collect();
            if let Some(title) = extractor.title(&bytes) {
                record.title = title;
            }
        }
        self.ctx.records().save_computed(&record)?;
        Ok(record)
    }
}
