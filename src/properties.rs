//! Per-document metadata records and the editor-supplied field set merged into them.
//!
//! Record fields fall into three groups:
//!
//! - **AUTO**: `path`, `name`, `created_at`, `last_edited`, `size`, `collection`, `folders`.
//!   Recomputed from filesystem state on every computed save.
//! - **MANUAL**: `tags`, `parents`, `file_type`, `status`, `priority`, `buckets`. Supplied by
//!   the editor and preserved unless overwritten with a new non-empty value.
//! - **COMPUTED**: `ancestors`, `kids`, `used_links`, `links_to_here`, `title`. Produced only by
//!   the synchronization engine.
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    time::SystemTime,
};

use crate::{
    config::IndexConfig,
    error::BuildonomyError,
    paths::{collection_of, file_name, file_stem, folders_of},
};

/// Filesystem facts about a document, as reported by a
/// [ContentSource](crate::store::ContentSource).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub size: u64,
    /// Unix seconds
    pub created: i64,
    /// Unix seconds
    pub modified: i64,
}

/// Seconds since the Unix epoch, clamped to zero for pre-epoch timestamps.
pub fn unix_seconds(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0)
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataRecord {
    pub path: String,
    pub name: String,
    pub created_at: i64,
    pub last_edited: i64,
    pub size: u64,
    pub collection: String,
    pub folders: Vec<String>,

    pub tags: Vec<String>,
    pub parents: Vec<String>,
    pub file_type: String,
    pub status: String,
    pub priority: String,
    pub buckets: BTreeMap<String, Vec<String>>,

    pub title: String,
    pub ancestors: Vec<String>,
    pub kids: Vec<String>,
    pub used_links: Vec<String>,
    pub links_to_here: Vec<String>,
}

impl MetadataRecord {
    /// An empty record for `key` with path-derived fields filled in. Used for first saves and
    /// for records created on demand when a neighbour links to a document nobody has saved yet.
    pub fn placeholder(key: &str) -> MetadataRecord {
        MetadataRecord {
            path: key.to_string(),
            name: file_name(key).to_string(),
            title: file_stem(key).to_string(),
            collection: collection_of(key),
            folders: folders_of(key),
            ..Default::default()
        }
    }

    /// Fill any still-empty MANUAL scalar with the configured default and make sure every
    /// configured bucket is present.
    pub fn apply_defaults(&mut self, config: &IndexConfig) {
        if self.file_type.is_empty() {
            self.file_type = config.default_file_type.clone();
        }
        if self.status.is_empty() {
            self.status = config.default_status.clone();
        }
        if self.priority.is_empty() {
            self.priority = config.default_priority.clone();
        }
        for bucket in config.buckets.iter() {
            self.buckets.entry(bucket.clone()).or_default();
        }
    }

    /// Overwrite the AUTO fields from the key and the document's filesystem state.
    ///
    /// `created_at` only moves when the record has never been stamped.
    pub fn refresh_auto(&mut self, key: &str, stat: &FileStat) {
        self.path = key.to_string();
        self.name = file_name(key).to_string();
        self.collection = collection_of(key);
        self.folders = folders_of(key);
        self.size = stat.size;
        self.last_edited = stat.modified;
        if self.created_at == 0 {
            self.created_at = if stat.created > 0 {
                stat.created
            } else {
                stat.modified
            };
        }
    }

    /// Drop every relationship computed by the engine.
    pub fn clear_computed_relations(&mut self) {
        self.ancestors.clear();
        self.kids.clear();
        self.used_links.clear();
        self.links_to_here.clear();
    }

    pub fn relation(&self, field: RelationField) -> &Vec<String> {
        match field {
            RelationField::Kids => &self.kids,
            RelationField::LinksToHere => &self.links_to_here,
            RelationField::Parents => &self.parents,
            RelationField::Ancestors => &self.ancestors,
        }
    }

    pub fn relation_mut(&mut self, field: RelationField) -> &mut Vec<String> {
        match field {
            RelationField::Kids => &mut self.kids,
            RelationField::LinksToHere => &mut self.links_to_here,
            RelationField::Parents => &mut self.parents,
            RelationField::Ancestors => &mut self.ancestors,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, BuildonomyError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

impl TryFrom<&[u8]> for MetadataRecord {
    type Error = BuildonomyError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl Display for MetadataRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\n\
             \t:path: {}\n\
             \t:type: {} :status: {} :priority: {}\n\
             \t:parents: {:?}\n\
             \t:ancestors: {:?}\n\
             \t:kids: {:?}\n\
             \t:used_links: {:?}\n\
             \t:links_to_here: {:?}",
            self.title,
            self.path,
            self.file_type,
            self.status,
            self.priority,
            self.parents,
            self.ancestors,
            self.kids,
            self.used_links,
            self.links_to_here,
        )
    }
}

/// Relationship lists a patch save may touch on a neighbouring record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationField {
    Kids,
    LinksToHere,
    /// Only rewritten by the move coordinator when a parent changes its key.
    Parents,
    /// Only rewritten by the move coordinator when a root changes its key.
    Ancestors,
}

impl Display for RelationField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RelationField::Kids => "kids",
            RelationField::LinksToHere => "links_to_here",
            RelationField::Parents => "parents",
            RelationField::Ancestors => "ancestors",
        };
        write!(f, "{name}")
    }
}

/// MANUAL fields supplied by an editor. `None` (or an empty value) keeps whatever the record
/// already holds.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditedFields {
    pub tags: Option<Vec<String>>,
    pub parents: Option<Vec<String>>,
    pub file_type: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub buckets: BTreeMap<String, Vec<String>>,
}

impl EditedFields {
    pub fn with_parents<I: IntoIterator<Item = S>, S: Into<String>>(mut self, parents: I) -> Self {
        self.parents = Some(parents.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_tags<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_bucket<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        bucket: &str,
        values: I,
    ) -> Self {
        self.buckets.insert(
            bucket.to_string(),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Merge into `record`, honouring the non-empty overwrite rule. List values are trimmed
    /// and de-duplicated in first-seen order; parents are expected to be normalized by the
    /// caller.
    pub fn merge_into(&self, record: &mut MetadataRecord) {
        if let Some(tags) = self.tags.as_ref().map(|t| clean_list(t)) {
            if !tags.is_empty() {
                record.tags = tags;
            }
        }
        if let Some(parents) = self.parents.as_ref().map(|p| clean_list(p)) {
            if !parents.is_empty() {
                record.parents = parents;
            }
        }
        for (field, value) in [
            (&mut record.file_type, &self.file_type),
            (&mut record.status, &self.status),
            (&mut record.priority, &self.priority),
        ] {
            if let Some(value) = value.as_deref().map(str::trim) {
                if !value.is_empty() {
                    *field = value.to_string();
                }
            }
        }
        for (bucket, values) in self.buckets.iter() {
            let values = clean_list(values);
            if !values.is_empty() {
                record.buckets.insert(bucket.clone(), values);
            }
        }
    }
}

/// Trim entries, drop empties, and remove duplicates keeping first-seen order.
pub fn clean_list(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values.iter().map(|v| v.trim()) {
        if !value.is_empty() && !out.iter().any(|seen| seen == value) {
            out.push(value.to_string());
        }
    }
    out
}
