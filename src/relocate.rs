use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use crate::{
    context::IndexContext,
    diagnostic::SyncDiagnostic,
    error::BuildonomyError,
    paths::{collection_of, file_name, folders_of},
    properties::{EditedFields, MetadataRecord, RelationField},
    store::{IfMissing, RelationPatch},
    sync::GraphSynchronizer,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveReport {
    pub from: String,
    pub to: String,
    /// Documents whose content was rewritten to reference the new key.
    pub rewritten: Vec<String>,
    pub diagnostics: Vec<SyncDiagnostic>,
}

/// Moves a document and carries every reference to it along.
pub struct MoveCoordinator<'a> {
    ctx: &'a IndexContext,
}

impl<'a> MoveCoordinator<'a> {
    pub fn new(ctx: &'a IndexContext) -> Self {
        MoveCoordinator { ctx }
    }

    /// Move `from` to `to`.
    ///
    /// The content is renamed if it still lives at `from`; if only `to` exists the caller is
    /// assumed to have moved it already. Every document linking to `from` has its references
    /// rewritten and is re-saved, then the record is relocated and neighbours naming the old key
    /// in their `kids`, `parents`, `links_to_here` or `ancestors` are patched.
    #[tracing::instrument(skip(self))]
    pub fn move_document(&self, from: &str, to: &str) -> Result<MoveReport, BuildonomyError> {
        let _gate = self.ctx.write_gate();
        let old = self.ctx.normalize(from);
        let new = self.ctx.normalize(to);
        let mut report = MoveReport {
            from: old.clone(),
            to: new.clone(),
            ..Default::default()
        };
        if old == new {
            return Ok(report);
        }

        let content = self.ctx.content();
        match (content.exists(&old), content.exists(&new)) {
            (true, false) => content.rename(&old, &new)?,
            (true, true) => {
                return Err(BuildonomyError::Custom(format!(
                    "cannot move '{old}': '{new}' already exists"
                )))
            }
            (false, true) => {
                tracing::debug!(
                    "[MoveCoordinator::move_document] '{}' already moved to '{}'",
                    old,
                    new
                );
            }
            (false, false) => {
                return Err(BuildonomyError::NotFound(format!(
                    "neither '{old}' nor '{new}' exists"
                )))
            }
        }

        let synchronizer = GraphSynchronizer::new(self.ctx);
        let Some(old_record) = self.ctx.records().get(&old)? else {
            let outcome = synchronizer.save(&new, &EditedFields::default())?;
            report.diagnostics.extend(outcome.diagnostics);
            return Ok(report);
        };

        let pipeline = self.ctx.pipeline();
        let retarget = |written: &str| pipeline.retarget(written, &old, &new);
        for linker in old_record.links_to_here.iter().filter(|l| **l != old) {
            match self.rewrite_linker(linker, &retarget) {
                Ok(true) => report.rewritten.push(linker.clone()),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        "[MoveCoordinator::move_document] Could not rewrite '{}': {}",
                        linker,
                        e
                    );
                    report.diagnostics.push(SyncDiagnostic::skipped(linker, e));
                    continue;
                }
            }
            match synchronizer.save(linker, &EditedFields::default()) {
                Ok(outcome) => report.diagnostics.extend(outcome.diagnostics),
                Err(e) => report.diagnostics.push(SyncDiagnostic::skipped(linker, e)),
            }
        }

        let relocated = self.relocate_record(&old, &new)?;
        self.patch_neighbors(&old, &new, &relocated, &mut report.diagnostics);

        let outcome = synchronizer.save(&new, &EditedFields::default())?;
        report.diagnostics.extend(outcome.diagnostics);
        tracing::info!(
            "[MoveCoordinator::move_document] Moved '{}' to '{}', rewrote {} linking documents",
            old,
            new,
            report.rewritten.len()
        );
        Ok(report)
    }

    /// Rewrite references in one linking document, returning whether its content changed.
    fn rewrite_linker(
        &self,
        linker: &str,
        retarget: &dyn Fn(&str) -> Option<String>,
    ) -> Result<bool, BuildonomyError> {
        let Some(extractor) = self.ctx.extractors().handler_for(linker) else {
            return Ok(false);
        };
        let bytes = self.ctx.content().read(linker)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| BuildonomyError::Codec(format!("'{linker}' is not UTF-8: {e}")))?;
        match extractor.rewrite_links(&text, retarget) {
            Some(rewritten) => {
                self.ctx.content().write(linker, rewritten.as_bytes())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write the record at `new` and delete it at `old`. Relationship lists already gathered
    /// at `new` (from linkers re-saved before the relocation) are merged in.
    fn relocate_record(&self, old: &str, new: &str) -> Result<MetadataRecord, BuildonomyError> {
        let records = self.ctx.records();
        let mut record = records
            .get(old)?
            .unwrap_or_else(|| MetadataRecord::placeholder(old));
        if let Some(existing) = records.get(new)? {
            for field in [RelationField::Kids, RelationField::LinksToHere] {
                for member in existing.relation(field).iter() {
                    RelationPatch::Add(field, member.clone()).apply(&mut record);
                }
            }
        }
        record.path = new.to_string();
        record.name = file_name(new).to_string();
        record.collection = collection_of(new);
        record.folders = folders_of(new);
        // A self-link through the old key now points at the new one
        for field in [RelationField::Kids, RelationField::LinksToHere] {
            RelationPatch::Replace(field, old.to_string(), new.to_string()).apply(&mut record);
        }
        records.save_computed(&record)?;
        records.delete(old)?;
        Ok(record)
    }

    fn patch_neighbors(
        &self,
        old: &str,
        new: &str,
        record: &MetadataRecord,
        diagnostics: &mut Vec<SyncDiagnostic>,
    ) {
        let mut patch = |neighbor: &str, field: RelationField| {
            let replace = RelationPatch::Replace(field, old.to_string(), new.to_string());
            if let Err(e) = self
                .ctx
                .records()
                .patch(neighbor, &[replace], IfMissing::Skip)
            {
                tracing::warn!(
                    "[MoveCoordinator::patch_neighbors] Failed to patch {} of '{}': {}",
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
        };
        for parent in record.parents.iter() {
            patch(parent, RelationField::Kids);
        }
        for target in record.used_links.iter() {
            patch(target, RelationField::LinksToHere);
        }
        for kid in record.kids.iter() {
            patch(kid, RelationField::Parents);
        }
        // Descendants may carry the old key as their top-level ancestor
        let mut queue = record.kids.iter().cloned().collect::<VecDeque<_>>();
        let mut visited = BTreeSet::from([new.to_string()]);
        while let Some(descendant) = queue.pop_front() {
            if !visited.insert(descendant.clone()) {
                continue;
            }
            patch(&descendant, RelationField::Ancestors);
            if let Ok(Some(found)) = self.ctx.records().get(&descendant) {
                queue.extend(found.kids);
            }
        }
    }
}
