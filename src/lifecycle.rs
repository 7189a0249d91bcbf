use crate::{
    context::IndexContext,
    diagnostic::SyncDiagnostic,
    error::BuildonomyError,
    properties::{MetadataRecord, RelationField},
    store::{IfMissing, RelationPatch},
};

/// Record creation and deletion outside of ordinary saves.
pub struct Lifecycle<'a> {
    ctx: &'a IndexContext,
}

impl<'a> Lifecycle<'a> {
    pub fn new(ctx: &'a IndexContext) -> Self {
        Lifecycle { ctx }
    }

    /// Create an empty record (AUTO fields filled, defaults applied) for every document that
    /// has none. Returns how many were created.
    #[tracing::instrument(skip(self))]
    pub fn initialize_all(&self) -> Result<usize, BuildonomyError> {
        let _gate = self.ctx.write_gate();
        let mut created = 0;
        for entry in self.ctx.content().list()? {
            let key = self.ctx.normalize(&entry.path);
            if key.is_empty() || self.ctx.records().contains(&key)? {
                continue;
            }
            let stat = match self.ctx.content().stat(&key) {
                Ok(stat) => stat,
                Err(e) => {
                    tracing::warn!("[Lifecycle::initialize_all] Skipping '{}': {}", key, e);
                    continue;
                }
            };
            let mut record = MetadataRecord::placeholder(&key);
            record.refresh_auto(&key, &stat);
            record.apply_defaults(self.ctx.config());
            self.ctx.records().save_computed(&record)?;
            created += 1;
        }
        tracing::info!("[Lifecycle::initialize_all] Created {} records", created);
        Ok(created)
    }

    /// Delete a document and detach it from the graph.
    ///
    /// The document is dropped from its parents' `kids` and its targets' `links_to_here`. Its
    /// record is deleted, or reset to a placeholder while other documents still declare it as
    /// a parent or link to it.
    #[tracing::instrument(skip(self))]
    pub fn remove_document(&self, path: &str) -> Result<Vec<SyncDiagnostic>, BuildonomyError> {
        let _gate = self.ctx.write_gate();
        let key = self.ctx.normalize(path);
        let mut diagnostics = Vec::new();
        if self.ctx.content().exists(&key) {
            self.ctx.content().remove(&key)?;
        }
        let Some(record) = self.ctx.records().get(&key)? else {
            self.ctx.records().delete(&key)?;
            return Ok(diagnostics);
        };

        let detach = record
            .parents
            .iter()
            .map(|parent| (parent, RelationField::Kids))
            .chain(
                record
                    .used_links
                    .iter()
                    .map(|target| (target, RelationField::LinksToHere)),
            );
        for (neighbor, field) in detach {
            let patch = RelationPatch::Remove(field, key.clone());
            if let Err(e) = self
                .ctx
                .records()
                .patch(neighbor, &[patch], IfMissing::Skip)
            {
                tracing::warn!(
                    "[Lifecycle::remove_document] Failed to patch {} of '{}': {}",
                    field,
                    neighbor,
                    e
                );
                diagnostics.push(SyncDiagnostic::NeighborPatchFailed {
                    neighbor: neighbor.clone(),
                    field,
                    message: e.to_string(),
                });
            }
        }

        if record.kids.is_empty() && record.links_to_here.is_empty() {
            self.ctx.records().delete(&key)?;
        } else {
            tracing::debug!(
                "[Lifecycle::remove_document] '{}' is still referenced, keeping a placeholder",
                key
            );
            let mut placeholder = MetadataRecord::placeholder(&key);
            placeholder.apply_defaults(self.ctx.config());
            placeholder.kids = record.kids;
            placeholder.links_to_here = record.links_to_here;
            self.ctx.records().save_computed(&placeholder)?;
        }
        Ok(diagnostics)
    }
}
