//! Org-mode link extraction.
//!
//! Recognizes `[[target]]` and `[[target][description]]` links. A `file:` prefix is stripped;
//! links with any other scheme (`id:`, `https:`, ...) are not document references. Links inside
//! `#+BEGIN_SRC` / `#+BEGIN_EXAMPLE` blocks are ignored.
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

use crate::codec::LinkExtractor;

static LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]]+)\](?:\[([^\[\]]*)\])?\]").unwrap());

static TITLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*#\+title:[ \t]*(.+?)[ \t]*$").unwrap());

static BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ims)^[ \t]*#\+begin_(src|example)\b.*?^[ \t]*#\+end_(src|example)\b").unwrap()
});

static SCHEME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").unwrap());

#[derive(Debug, Default, Clone)]
pub struct OrgExtractor;

impl OrgExtractor {
    pub fn new() -> Self {
        OrgExtractor
    }
}

/// The document path a raw org link target refers to, with its `file:` prefix removed, or `None`
/// for non-file schemes.
fn file_target(raw: &str) -> Option<&str> {
    if let Some(rest) = raw.strip_prefix("file:") {
        return Some(rest);
    }
    if SCHEME_REGEX.is_match(raw) {
        return None;
    }
    Some(raw)
}

fn block_ranges(content: &str) -> Vec<Range<usize>> {
    BLOCK_REGEX.find_iter(content).map(|m| m.range()).collect()
}

impl LinkExtractor for OrgExtractor {
    fn extract_links(&self, content: &[u8]) -> Vec<String> {
        let content = String::from_utf8_lossy(content);
        let blocks = block_ranges(&content);
        LINK_REGEX
            .captures_iter(&content)
            .filter(|caps| {
                caps.get(0)
                    .map(|m| !blocks.iter().any(|block| block.contains(&m.start())))
                    .unwrap_or(false)
            })
            .filter_map(|caps| caps.get(1).and_then(|m| file_target(m.as_str())))
            .map(|target| target.to_string())
            .collect()
    }

    fn title(&self, content: &[u8]) -> Option<String> {
        let content = String::from_utf8_lossy(content);
        TITLE_REGEX
            .captures(&content)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn rewrite_links(
        &self,
        content: &str,
        retarget: &dyn Fn(&str) -> Option<String>,
    ) -> Option<String> {
        let blocks = block_ranges(content);
        let mut changed = false;
        let rewritten = LINK_REGEX.replace_all(content, |caps: &Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let (Some(start), Some(target)) = (caps.get(0).map(|m| m.start()), caps.get(1)) else {
                return whole.to_string();
            };
            if blocks.iter().any(|block| block.contains(&start)) {
                return whole.to_string();
            }
            let raw = target.as_str();
            let (scheme, written) = match raw.strip_prefix("file:") {
                Some(rest) => ("file:", rest),
                None if SCHEME_REGEX.is_match(raw) => return whole.to_string(),
                None => ("", raw),
            };
            let Some(replacement) = retarget(written) else {
                return whole.to_string();
            };
            changed = true;
            match caps.get(2) {
                Some(description) => {
                    format!("[[{scheme}{replacement}][{}]]", description.as_str())
                }
                None => format!("[[{scheme}{replacement}]]"),
            }
        });
        changed.then(|| rewritten.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::LinkPipeline, config::IndexConfig};

    #[test]
    fn extracts_file_links_only() {
        let content = "#+TITLE: Agenda\n\
                       * Tasks\n\
                       See [[file:projects/plan.org][the plan]] and [[notes/idea.md]].\n\
                       Also [[https://example.com][a site]] and [[id:1234][by id]].\n\
                       #+BEGIN_SRC org\n\
                       [[file:ignored.org]]\n\
                       #+END_SRC\n\
                       [[file:../shared/ref.org::*Heading][ref]]\n";
        let links = OrgExtractor::new().extract_links(content.as_bytes());
        assert_eq!(
            links,
            vec![
                "projects/plan.org",
                "notes/idea.md",
                "../shared/ref.org::*Heading"
            ]
        );
    }

    #[test]
    fn title_keyword_is_case_insensitive() {
        let extractor = OrgExtractor::new();
        assert_eq!(
            extractor.title(b"#+title:   Weekly Review  \n* body"),
            Some("Weekly Review".to_string())
        );
        assert_eq!(extractor.title(b"* No title"), None);
    }

    #[test]
    fn rewrite_keeps_scheme_and_description() {
        let pipeline = LinkPipeline::new(&IndexConfig::default());
        let retarget = |written: &str| pipeline.retarget(written, "old.org", "archive/old.org");
        let content =
            "[[file:old.org][Old]] [[/old.org]] [[file:old.org::*Top]] [[other.org]] [[id:old.org]]";
        assert_eq!(
            OrgExtractor::new()
                .rewrite_links(content, &retarget)
                .unwrap(),
            "[[file:archive/old.org][Old]] [[/archive/old.org]] [[file:archive/old.org::*Top]] [[other.org]] [[id:old.org]]"
        );
        assert_eq!(
            OrgExtractor::new().rewrite_links("[[other.org]]", &retarget),
            None
        );
    }
}
