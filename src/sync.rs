//! Incremental synchronization of one document and its immediate neighbours.
use serde::{Deserialize, Serialize};

use crate::{
    ancestors::AncestorResolver,
    context::IndexContext,
    diagnostic::SyncDiagnostic,
    error::BuildonomyError,
    paths::file_stem,
    properties::{clean_list, EditedFields, MetadataRecord, RelationField},
    store::{IfMissing, RelationPatch},
};

/// What a computed save did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// The record as persisted.
    pub record: MetadataRecord,
    pub links_added: Vec<String>,
    pub links_removed: Vec<String>,
    pub parents_added: Vec<String>,
    pub parents_removed: Vec<String>,
    pub diagnostics: Vec<SyncDiagnostic>,
}

/// `(removed, added)` between two ordered sets, each in the order of the list it came from.
pub(crate) fn list_diff(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let removed = old.iter().filter(|o| !new.contains(o)).cloned().collect();
    let added = new.iter().filter(|n| !old.contains(n)).cloned().collect();
    (removed, added)
}

pub struct GraphSynchronizer<'a> {
    ctx: &'a IndexContext,
}

impl<'a> GraphSynchronizer<'a> {
    pub fn new(ctx: &'a IndexContext) -> Self {
        GraphSynchronizer { ctx }
    }

    /// Computed save of the document at `path`.
    ///
    /// Recomputes the record's AUTO and COMPUTED fields from the document and `edits`, patches
    /// the neighbours whose `kids` or `links_to_here` are affected by a change of parents or
    /// links, and persists the record last.
    ///
    /// Fails without writing anything when the document itself cannot be read. A neighbour that
    /// cannot be patched is logged and reported in [SaveOutcome::diagnostics]; the save still
    /// commits.
    #[tracing::instrument(skip(self, edits))]
    pub fn save(&self, path: &str, edits: &EditedFields) -> Result<SaveOutcome, BuildonomyError> {
        let _gate = self.ctx.write_gate();
        let key = self.ctx.normalize(path);
        if key.is_empty() {
            return Err(BuildonomyError::Custom(format!(
                "'{path}' does not name a document"
            )));
        }

        // Everything that can abort the save happens before the first write
        let stat = self.ctx.content().stat(&key)?;
        let extractor = self.ctx.extractors().handler_for(&key);
        let bytes = match extractor.as_ref() {
            Some(_) => Some(self.ctx.content().read(&key)?),
            None => None,
        };

        let mut diagnostics = Vec::new();
        let previous = self.load_previous(&key, &mut diagnostics)?;
        let mut record = previous
            .clone()
            .unwrap_or_else(|| MetadataRecord::placeholder(&key));

        record.refresh_auto(&key, &stat);
        self.normalized_edits(&key, edits, &mut diagnostics)
            .merge_into(&mut record);
        record.apply_defaults(self.ctx.config());

        let old_parents = previous
            .as_ref()
            .map(|p| p.parents.clone())
            .unwrap_or_default();
        let (parents_removed, parents_added) = list_diff(&old_parents, &record.parents);
        for parent in parents_removed.iter() {
            self.patch_neighbor(
                parent,
                RelationPatch::Remove(RelationField::Kids, key.clone()),
                IfMissing::Skip,
                &mut diagnostics,
            );
        }
        for parent in parents_added.iter() {
            self.patch_neighbor(
                parent,
                RelationPatch::Add(RelationField::Kids, key.clone()),
                IfMissing::Create(self.ctx.config()),
                &mut diagnostics,
            );
        }

        let ancestry = AncestorResolver::new(self.ctx.records()).resolve(&key, &record.parents)?;
        record.ancestors = ancestry.ancestors;
        diagnostics.extend(ancestry.diagnostics);

        let (used_links, title) = match (extractor, bytes) {
            (Some(extractor), Some(bytes)) => (
                self.ctx.pipeline().extract(extractor.as_ref(), &bytes),
                extractor.title(&bytes),
            ),
            _ => (Vec::new(), None),
        };
        record.used_links = used_links.into_iter().filter(|t| *t != key).collect();
        record.title = title.unwrap_or_else(|| file_stem(&key).to_string());

        let old_links = previous
            .as_ref()
            .map(|p| p.used_links.clone())
            .unwrap_or_default();
        let (links_removed, links_added) = list_diff(&old_links, &record.used_links);
        for target in links_removed.iter() {
            self.patch_neighbor(
                target,
                RelationPatch::Remove(RelationField::LinksToHere, key.clone()),
                IfMissing::Skip,
                &mut diagnostics,
            );
        }
        for target in links_added.iter() {
            self.patch_neighbor(
                target,
                RelationPatch::Add(RelationField::LinksToHere, key.clone()),
                IfMissing::Create(self.ctx.config()),
                &mut diagnostics,
            );
        }

        self.ctx.records().save_computed(&record)?;
        tracing::debug!(
            "[GraphSynchronizer::save] {}: +{} -{} links, +{} -{} parents",
            key,
            links_added.len(),
            links_removed.len(),
            parents_added.len(),
            parents_removed.len()
        );
        Ok(SaveOutcome {
            record,
            links_added,
            links_removed,
            parents_added,
            parents_removed,
            diagnostics,
        })
    }

    fn load_previous(
        &self,
        key: &str,
        diagnostics: &mut Vec<SyncDiagnostic>,
    ) -> Result<Option<MetadataRecord>, BuildonomyError> {
        match self.ctx.records().get_strict(key) {
            Ok(previous) => Ok(previous),
            Err(BuildonomyError::Serialization(message)) => {
                tracing::warn!(
                    "[GraphSynchronizer::save] Stored record for '{}' is malformed, starting fresh: {}",
                    key,
                    message
                );
                diagnostics.push(SyncDiagnostic::MalformedRecord {
                    key: key.to_string(),
                    message,
                });
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// `edits` with parents normalized to keys and self-parents dropped.
    fn normalized_edits(
        &self,
        key: &str,
        edits: &EditedFields,
        diagnostics: &mut Vec<SyncDiagnostic>,
    ) -> EditedFields {
        let mut edits = edits.clone();
        if let Some(parents) = edits.parents.take() {
            let normalized = parents
                .iter()
                .map(|parent| self.ctx.normalize(parent))
                .filter(|parent| {
                    if parent == key {
                        tracing::warn!(
                            "[GraphSynchronizer::save] '{}' declares itself as a parent, ignoring",
                            key
                        );
                        diagnostics.push(SyncDiagnostic::warning(format!(
                            "'{key}' declares itself as a parent"
                        )));
                        false
                    } else {
                        true
                    }
                })
                .collect::<Vec<_>>();
            edits.parents = Some(clean_list(&normalized));
        }
        edits
    }

    fn patch_neighbor(
        &self,
        neighbor: &str,
        patch: RelationPatch,
        if_missing: IfMissing<'_>,
        diagnostics: &mut Vec<SyncDiagnostic>,
    ) {
        let field = match &patch {
            RelationPatch::Add(field, _)
            | RelationPatch::Remove(field, _)
            | RelationPatch::Replace(field, _, _)
            | RelationPatch::Set(field, _) => *field,
        };
        if let Err(e) = self
            .ctx
            .records()
            .patch(neighbor, std::slice::from_ref(&patch), if_missing)
        {
            tracing::warn!(
                "[GraphSynchronizer::patch_neighbor] Failed to patch {} of '{}': {}",
                field,
                neighbor,
                e
            );
            diagnostics.push(SyncDiagnostic::NeighborPatchFailed {
                neighbor: neighbor.to_string(),
                field,
                message: e.to_string(),
            });
        }
    }
}
