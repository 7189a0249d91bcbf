use pulldown_cmark::{
    Event as MdEvent, HeadingLevel, LinkType, Options, Parser as MdParser, Tag as MdTag,
    TagEnd as MdTagEnd,
};
use std::ops::Range;

use crate::codec::LinkExtractor;

pub use pulldown_cmark;

pub fn noet_md_options() -> Options {
    let mut md_options = Options::empty();
    // Enabled explicitly rather than via `Options::all()` for reproducibility.
    md_options.insert(Options::ENABLE_FOOTNOTES);
    md_options.insert(Options::ENABLE_GFM);
    md_options.insert(Options::ENABLE_MATH);
    md_options.insert(Options::ENABLE_STRIKETHROUGH);
    md_options.insert(Options::ENABLE_TABLES);
    md_options.insert(Options::ENABLE_TASKLISTS);
    md_options.insert(Options::ENABLE_WIKILINKS);
    md_options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    md_options
}

/// Markdown link extraction on top of pulldown-cmark.
///
/// Recognized reference forms:
///
/// - `[[target]]` and `[[target|alias]]` wiki links
/// - `![[target]]` embeds
/// - `[text](target "title")` inline links, `![alt](target)` images, and reference-style links
///
/// Links inside code spans and fenced blocks are not references.
#[derive(Debug, Default, Clone)]
pub struct MarkdownExtractor;

/// A link occurrence: its written destination and the source range it spans.
struct LinkSite<'a> {
    dest: pulldown_cmark::CowStr<'a>,
    link_type: LinkType,
    range: Range<usize>,
}

impl MarkdownExtractor {
    pub fn new() -> Self {
        MarkdownExtractor
    }

    fn link_sites(content: &str) -> Vec<LinkSite<'_>> {
        MdParser::new_ext(content, noet_md_options())
            .into_offset_iter()
            .filter_map(|(event, range)| match event {
                MdEvent::Start(MdTag::Link {
                    link_type,
                    dest_url,
                    ..
                })
                | MdEvent::Start(MdTag::Image {
                    link_type,
                    dest_url,
                    ..
                }) => match link_type {
                    LinkType::Email | LinkType::Autolink => None,
                    _ => Some(LinkSite {
                        dest: dest_url,
                        link_type,
                        range,
                    }),
                },
                _ => None,
            })
            .collect()
    }
}

fn frontmatter_title(block: &str) -> Option<String> {
    let frontmatter = match serde_yaml::from_str::<serde_yaml::Value>(block) {
        Ok(frontmatter) => frontmatter,
        Err(e) => {
            tracing::debug!("[MarkdownExtractor::title] Unparseable frontmatter: {}", e);
            return None;
        }
    };
    let title = frontmatter.get("title")?.as_str()?.trim();
    (!title.is_empty()).then(|| title.to_string())
}

impl LinkExtractor for MarkdownExtractor {
    fn extract_links(&self, content: &[u8]) -> Vec<String> {
        let content = String::from_utf8_lossy(content);
        Self::link_sites(&content)
            .into_iter()
            .map(|site| site.dest.to_string())
            .collect()
    }

    /// The `title:` key of YAML frontmatter, else the text of the first level-one heading.
    fn title(&self, content: &[u8]) -> Option<String> {
        let content = String::from_utf8_lossy(content);
        let mut in_metadata = false;
        let mut in_heading = false;
        let mut heading = String::new();
        for event in MdParser::new_ext(&content, noet_md_options()) {
            match event {
                MdEvent::Start(MdTag::MetadataBlock(_)) => in_metadata = true,
                MdEvent::End(MdTagEnd::MetadataBlock(_)) => in_metadata = false,
                MdEvent::Text(text) if in_metadata => {
                    if let Some(title) = frontmatter_title(&text) {
                        return Some(title);
                    }
                }
                MdEvent::Start(MdTag::Heading {
                    level: HeadingLevel::H1,
                    ..
                }) => in_heading = true,
                MdEvent::End(MdTagEnd::Heading(HeadingLevel::H1)) => {
                    let title = heading.trim();
                    if !title.is_empty() {
                        return Some(title.to_string());
                    }
                    in_heading = false;
                }
                MdEvent::Text(text) | MdEvent::Code(text) if in_heading => heading.push_str(&text),
                _ => {}
            }
        }
        None
    }

    fn rewrite_links(
        &self,
        content: &str,
        retarget: &dyn Fn(&str) -> Option<String>,
    ) -> Option<String> {
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();
        for site in Self::link_sites(content) {
            let Some(replacement) = retarget(&site.dest) else {
                continue;
            };
            let written = &content[site.range.clone()];
            // Wiki links lead with their target, inline links end with it
            let search_from = match site.link_type {
                LinkType::WikiLink { .. } => 0,
                _ => written.rfind("](").map(|idx| idx + 2).unwrap_or(0),
            };
            let Some(offset) = written[search_from..].find(&*site.dest) else {
                tracing::debug!(
                    "[MarkdownExtractor::rewrite_links] Destination '{}' not found verbatim in {:?}",
                    site.dest,
                    written
                );
                continue;
            };
            let start = site.range.start + search_from + offset;
            edits.push((start..start + site.dest.len(), replacement));
        }
        if edits.is_empty() {
            return None;
        }
        let mut rewritten = content.to_string();
        for (range, replacement) in edits.into_iter().rev() {
            rewritten.replace_range(range, &replacement);
        }
        Some(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::LinkPipeline, config::IndexConfig};

    fn rewrite(content: &str) -> Option<String> {
        let pipeline = LinkPipeline::new(&IndexConfig::default());
        MarkdownExtractor::new().rewrite_links(content, &|written: &str| {
            pipeline.retarget(written, "old/note.md", "new/note.md")
        })
    }

    #[test]
    fn extracts_every_reference_form_in_order() {
        let content = "# Title\n\
                       See [[alpha]] and [[beta|the beta]].\n\n\
                       ![[diagram.png]]\n\n\
                       An [inline](gamma.md \"Gamma\") and ![img](pics/photo.jpg).\n";
        let links = MarkdownExtractor::new().extract_links(content.as_bytes());
        assert_eq!(
            links,
            vec!["alpha", "beta", "diagram.png", "gamma.md", "pics/photo.jpg"]
        );
    }

    #[test]
    fn code_is_not_linked() {
        let content = "`[[nope]]`\n\n```\n[[also-nope]]\n```\n\n[[yes]]\n";
        let links = MarkdownExtractor::new().extract_links(content.as_bytes());
        assert_eq!(links, vec!["yes"]);
    }

    #[test]
    fn title_from_heading_or_frontmatter() {
        let extractor = MarkdownExtractor::new();
        assert_eq!(
            extractor.title(b"intro\n\n# The `Plan`\n\n# Second"),
            Some("The Plan".to_string())
        );
        assert_eq!(
            extractor.title(b"---\ntitle: \"From Front\"\n---\n\n# Heading\n"),
            Some("From Front".to_string())
        );
        assert_eq!(extractor.title(b"## Only a subheading\n"), None);
    }

    #[test]
    fn rewrite_preserves_alias_anchor_and_traversal() {
        let content = "[[old/note]] [[old/note#part|Alias]] [old note](../old/note.md) [[other]]\n";
        assert_eq!(
            rewrite(content).unwrap(),
            "[[new/note]] [[new/note#part|Alias]] [old note](../new/note.md) [[other]]\n"
        );
    }

    #[test]
    fn rewrite_matches_rooted_references() {
        let content = "[[/old/note]] and [n](/old/note.md)\n";
        assert_eq!(
            rewrite(content).unwrap(),
            "[[/new/note]] and [n](/new/note.md)\n"
        );
    }

    #[test]
    fn rewrite_skips_link_text_and_code() {
        let content = "[old/note.md](old/note.md)\n\n`[[old/note]]`\n";
        assert_eq!(
            rewrite(content).unwrap(),
            "[old/note.md](new/note.md)\n\n`[[old/note]]`\n"
        );
    }

    #[test]
    fn rewrite_without_matches_is_none() {
        assert_eq!(rewrite("[[other]]"), None);
    }
}
