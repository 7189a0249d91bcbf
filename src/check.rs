use std::collections::BTreeMap;

use crate::{
    ancestors::AncestorResolver, context::IndexContext, error::BuildonomyError,
    properties::MetadataRecord,
};

fn kids(record: &MetadataRecord) -> &Vec<String> {
    &record.kids
}

fn parents(record: &MetadataRecord) -> &Vec<String> {
    &record.parents
}

fn used_links(record: &MetadataRecord) -> &Vec<String> {
    &record.used_links
}

fn links_to_here(record: &MetadataRecord) -> &Vec<String> {
    &record.links_to_here
}

/// Audits the stored graph against its invariants.
pub struct InvariantChecker<'a> {
    ctx: &'a IndexContext,
}

impl<'a> InvariantChecker<'a> {
    pub fn new(ctx: &'a IndexContext) -> Self {
        InvariantChecker { ctx }
    }

    /// Every violation found, as one readable line each. An empty list means the graph is
    /// consistent:
    ///
    /// - `X ∈ kids(Y)` exactly when `Y ∈ parents(X)`
    /// - `X ∈ links_to_here(Y)` exactly when `Y ∈ used_links(X)`
    /// - no record lists itself as an ancestor or link target
    /// - no relationship list holds duplicates
    pub fn built_in_test(&self) -> Result<Vec<String>, BuildonomyError> {
        let mut violations = Vec::new();
        let mut records: BTreeMap<String, MetadataRecord> = BTreeMap::new();
        for key in self.ctx.records().keys()? {
            match self.ctx.records().get_strict(&key) {
                Ok(Some(record)) => {
                    records.insert(key, record);
                }
                Ok(None) => {}
                Err(e) => violations.push(format!("{key}: unreadable record: {e}")),
            }
        }

        let has = |key: &str, pick: fn(&MetadataRecord) -> &Vec<String>, member: &str| {
            records
                .get(key)
                .map(|record| pick(record).iter().any(|m| m == member))
                .unwrap_or(false)
        };

        for (key, record) in records.iter() {
            if record.path != *key {
                violations.push(format!("{key}: stored under a different path '{}'", record.path));
            }
            if record.ancestors.contains(key) {
                violations.push(format!("{key}: is its own ancestor"));
            }
            if record.used_links.contains(key) {
                violations.push(format!("{key}: links to itself"));
            }
            for (name, list) in [
                ("parents", &record.parents),
                ("kids", &record.kids),
                ("ancestors", &record.ancestors),
                ("used_links", &record.used_links),
                ("links_to_here", &record.links_to_here),
            ] {
                for (idx, member) in list.iter().enumerate() {
                    if list[..idx].contains(member) {
                        violations.push(format!("{key}: duplicate '{member}' in {name}"));
                    }
                }
            }
            for parent in record.parents.iter() {
                if !has(parent, kids, key) {
                    violations.push(format!("{key}: parent '{parent}' does not list it as a kid"));
                }
            }
            for kid in record.kids.iter() {
                if !has(kid, parents, key) {
                    violations.push(format!("{key}: kid '{kid}' does not declare it as a parent"));
                }
            }
            for target in record.used_links.iter() {
                if !has(target, links_to_here, key) {
                    violations.push(format!(
                        "{key}: link target '{target}' does not list it in links_to_here"
                    ));
                }
            }
            for linker in record.links_to_here.iter() {
                if !has(linker, used_links, key) {
                    violations.push(format!("{key}: '{linker}' is listed as linking here but does not"));
                }
            }
        }
        for violation in violations.iter() {
            tracing::warn!("[InvariantChecker::built_in_test] {}", violation);
        }
        Ok(violations)
    }

    /// Records whose stored `ancestors` differ from a fresh resolution over the stored parents.
    ///
    /// A save only recomputes the saved document's own ancestors, so descendants of a
    /// re-parented document drift until they are saved again. A full rebuild leaves none.
    pub fn stale_ancestors(&self) -> Result<Vec<String>, BuildonomyError> {
        let records = self.ctx.records();
        let resolver = AncestorResolver::new(records);
        let mut stale = Vec::new();
        for key in records.keys()? {
            let Some(record) = records.get(&key)? else {
                continue;
            };
            let fresh = resolver.resolve(&key, &record.parents)?.ancestors;
            if fresh != record.ancestors {
                stale.push(format!(
                    "{key}: stored ancestors {:?} but parents resolve to {:?}",
                    record.ancestors, fresh
                ));
            }
        }
        for entry in stale.iter() {
            tracing::debug!("[InvariantChecker::stale_ancestors] {}", entry);
        }
        Ok(stale)
    }
}
