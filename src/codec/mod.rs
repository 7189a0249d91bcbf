//! Link extraction from raw document content.
//!
//! ## Key Components
//!
//! - [`LinkExtractor`] trait - per-format plugin returning raw link-target strings
//! - [`ExtractorMap`] - registry resolving a document path to its extractor by extension
//! - [`LinkPipeline`] - the format-independent half: filtering malformed matches, stripping
//!   anchors, aliases and parent-traversal markers, defaulting extensions, normalizing, and
//!   de-duplicating in first-seen order
//!
//! ## Built-in Extractors
//!
//! - **Markdown** (`.md`, `.markdown`) - via [`md::MarkdownExtractor`]
//! - **Org-mode** (`.org`) - via [`org::OrgExtractor`]
//!
//! Register custom extractors via [`ExtractorMap::insert`]:
//!
//! ```rust
//! use noet_index::codec::{ExtractorMap, LinkExtractor};
//! use std::sync::Arc;
//!
//! struct CsvRefs;
//!
//! impl LinkExtractor for CsvRefs {
//!     fn extract_links(&self, content: &[u8]) -> Vec<String> {
//!         String::from_utf8_lossy(content)
//!             .split(',')
//!             .filter(|cell| cell.trim().starts_with("ref:"))
//!             .map(|cell| cell.trim().trim_start_matches("ref:").to_string())
//!             .collect()
//!     }
//! }
//!
//! let extractors = ExtractorMap::create();
//! extractors.insert("csv", Arc::new(CsvRefs));
//! assert!(extractors.handler_for("tables/people.csv").is_some());
//! ```
use parking_lot::RwLock;
use std::sync::Arc;

use crate::paths::extension;

pub mod md;
pub mod org;
pub mod pipeline;

pub use md::MarkdownExtractor;
pub use org::OrgExtractor;
pub use pipeline::LinkPipeline;

pub trait LinkExtractor: Send + Sync {
    /// Raw link targets in document order. May contain anchors, aliases, duplicates, and
    /// garbage; [LinkPipeline] cleans them up.
    fn extract_links(&self, content: &[u8]) -> Vec<String>;

    /// Human title of the document, if the format declares one.
    fn title(&self, _content: &[u8]) -> Option<String> {
        None
    }

    /// Rewrite references in `content`. `retarget` receives each written target and returns
    /// its replacement, or `None` to leave it alone. Returns `None` when nothing changed or the
    /// format does not support rewriting.
    fn rewrite_links(
        &self,
        _content: &str,
        _retarget: &dyn Fn(&str) -> Option<String>,
    ) -> Option<String> {
        None
    }
}

/// Registry of extractors keyed by lowercase file extension.
#[allow(clippy::type_complexity)]
pub struct ExtractorMap(Arc<RwLock<Vec<(String, Arc<dyn LinkExtractor>)>>>);

impl Clone for ExtractorMap {
    fn clone(&self) -> Self {
        ExtractorMap(self.0.clone())
    }
}

impl Default for ExtractorMap {
    fn default() -> Self {
        Self::create()
    }
}

impl ExtractorMap {
    /// Registry preloaded with the built-in markdown and org-mode extractors.
    pub fn create() -> Self {
        let markdown: Arc<dyn LinkExtractor> = Arc::new(MarkdownExtractor::new());
        ExtractorMap(Arc::new(RwLock::new(vec![
            ("md".to_string(), markdown.clone()),
            ("markdown".to_string(), markdown),
            ("org".to_string(), Arc::new(OrgExtractor::new())),
        ])))
    }

    pub fn empty() -> Self {
        ExtractorMap(Arc::new(RwLock::new(Vec::new())))
    }

    pub fn insert(&self, extension: &str, extractor: Arc<dyn LinkExtractor>) {
        let extension = extension.trim_start_matches('.').to_lowercase();
        let mut writer = self.0.write();
        if let Some(entry) = writer.iter_mut().find(|(ext, _)| *ext == extension) {
            entry.1 = extractor;
        } else {
            writer.push((extension, extractor));
        }
    }

    pub fn get(&self, ext: &str) -> Option<Arc<dyn LinkExtractor>> {
        self.0
            .read()
            .iter()
            .find(|(codec_ext, _)| codec_ext == ext)
            .map(|(_, extractor)| extractor.clone())
    }

    /// The extractor responsible for the document at `path`, if its format has one.
    pub fn handler_for(&self, path: &str) -> Option<Arc<dyn LinkExtractor>> {
        self.get(&extension(path))
    }

    pub fn extensions(&self) -> Vec<String> {
        self.0.read().iter().map(|(ext, _)| ext.clone()).collect()
    }
}

impl std::fmt::Debug for ExtractorMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ExtractorMap").field(&self.extensions()).finish()
    }
}

/// Split a written link target into its leading `./` / `../` markers, the path itself, and any
/// trailing anchor or alias text (`#...`, `|...`, `::...`).
pub(crate) fn split_written_target(dest: &str) -> (&str, &str, &str) {
    let mut body = dest;
    while let Some(rest) = body
        .strip_prefix("../")
        .or_else(|| body.strip_prefix("./"))
    {
        body = rest;
    }
    let traversal = &dest[..dest.len() - body.len()];
    let path_end = [body.find('#'), body.find('|'), body.find("::")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(body.len());
    (traversal, &body[..path_end], &body[path_end..])
}

/// Percent-encode each segment of a key, keeping the separators readable.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_lookup_by_extension() {
        let map = ExtractorMap::create();
        assert!(map.handler_for("notes/a.md").is_some());
        assert!(map.handler_for("notes/a.MD").is_some());
        assert!(map.handler_for("agenda.org").is_some());
        assert!(map.handler_for("photo.png").is_none());
        assert!(map.handler_for("README").is_none());
    }

    #[test]
    fn written_targets_split_into_parts() {
        assert_eq!(
            split_written_target("../../a/b.md#top"),
            ("../../", "a/b.md", "#top")
        );
        assert_eq!(split_written_target("./a|alias"), ("./", "a", "|alias"));
        assert_eq!(
            split_written_target("file.org::*Heading"),
            ("", "file.org", "::*Heading")
        );
        assert_eq!(split_written_target("plain"), ("", "plain", ""));
    }
}
