use std::collections::HashSet;

use crate::{diagnostic::SyncDiagnostic, error::BuildonomyError, store::RecordStore};

/// Result of resolving one document's ancestors.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ancestry {
    /// Top-level ancestors, one per declared parent branch, de-duplicated in first-seen order.
    pub ancestors: Vec<String>,
    pub diagnostics: Vec<SyncDiagnostic>,
}

/// Climbs declared parents to the top of each chain.
///
/// Each declared parent starts a branch that follows only the *first* parent of every node it
/// passes through. A node with no parents, or with no record at all, ends the branch and is the
/// ancestor it yields. Every branch carries its own visited set seeded with the document being
/// resolved; a revisit ends the branch with no ancestor and a [SyncDiagnostic::CycleDetected].
#[derive(Debug)]
pub struct AncestorResolver<'a> {
    records: &'a RecordStore,
}

impl<'a> AncestorResolver<'a> {
    pub fn new(records: &'a RecordStore) -> Self {
        AncestorResolver { records }
    }

    #[tracing::instrument(skip(self))]
    pub fn resolve(&self, key: &str, parents: &[String]) -> Result<Ancestry, BuildonomyError> {
        let mut ancestry = Ancestry::default();
        let mut started: HashSet<&str> = HashSet::new();
        for parent in parents.iter() {
            if !started.insert(parent.as_str()) {
                continue;
            }
            match self.climb(key, parent)? {
                Ok(top) => {
                    if !ancestry.ancestors.contains(&top) {
                        ancestry.ancestors.push(top);
                    }
                }
                Err(cycle) => ancestry.diagnostics.push(cycle),
            }
        }
        Ok(ancestry)
    }

    /// The terminal node above `start`, or the cycle that prevented reaching one.
    fn climb(
        &self,
        key: &str,
        start: &str,
    ) -> Result<Result<String, SyncDiagnostic>, BuildonomyError> {
        let mut visited: HashSet<String> = HashSet::from([key.to_string()]);
        let mut current = start.to_string();
        loop {
            if !visited.insert(current.clone()) {
                tracing::warn!(
                    "[AncestorResolver::climb] Parent cycle from '{}' through '{}': revisited '{}'",
                    key,
                    start,
                    current
                );
                return Ok(Err(SyncDiagnostic::CycleDetected {
                    start: key.to_string(),
                    at: current,
                }));
            }
            let next = self
                .records
                .get(&current)?
                .and_then(|record| record.parents.into_iter().next());
            match next {
                Some(parent) => current = parent,
                None => return Ok(Ok(current)),
            }
        }
    }
}
