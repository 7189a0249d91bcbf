use std::collections::{BTreeSet, HashSet};

use crate::{
    codec::{encode_key, split_written_target, LinkExtractor},
    config::IndexConfig,
    paths::{extension, PathNormalizer},
};

/// Turns raw extractor output into an ordered set of canonical link targets.
#[derive(Debug, Clone)]
pub struct LinkPipeline {
    normalizer: PathNormalizer,
    default_extension: String,
    recognized_extensions: BTreeSet<String>,
    max_link_length: usize,
}

impl LinkPipeline {
    pub fn new(config: &IndexConfig) -> Self {
        LinkPipeline {
            normalizer: config.normalizer(),
            default_extension: config.default_extension.trim_start_matches('.').to_string(),
            recognized_extensions: config
                .document_extensions
                .union(&config.media_extensions)
                .cloned()
                .collect(),
            max_link_length: config.max_link_length,
        }
    }

    /// Canonical key for one raw match, or `None` when the match is not a document reference.
    pub fn normalize_target(&self, raw: &str) -> Option<String> {
        if raw.contains('\n') || raw.contains('\r') {
            tracing::debug!(
                "[LinkPipeline::normalize_target] Discarding match spanning lines: {:?}",
                raw
            );
            return None;
        }
        if raw.len() > self.max_link_length {
            tracing::debug!(
                "[LinkPipeline::normalize_target] Discarding {} byte match (limit {})",
                raw.len(),
                self.max_link_length
            );
            return None;
        }
        let target = raw.split('|').next().unwrap_or_default().trim();
        if target.contains("://") || target.starts_with("mailto:") {
            return None;
        }
        let target = [target.find('#'), target.find("::")]
            .into_iter()
            .flatten()
            .min()
            .map(|end| &target[..end])
            .unwrap_or(target);
        let decoded = urlencoding::decode(target)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| target.to_string());
        let mut target = decoded.trim().replace('\\', "/");
        loop {
            if let Some(rest) = target.strip_prefix("../") {
                target = rest.to_string();
            } else if let Some(rest) = target.strip_prefix("./") {
                target = rest.to_string();
            } else {
                break;
            }
        }
        if target.trim_matches('/').is_empty() {
            return None;
        }
        if !self.recognized_extensions.contains(&extension(&target)) {
            target = format!("{}.{}", target.trim_end_matches('/'), self.default_extension);
        }
        let key = self.normalizer.normalize(&target);
        (!key.is_empty()).then_some(key)
    }

    /// Normalize and de-duplicate raw matches, keeping first-seen order.
    pub fn collect<I, S>(&self, raw_matches: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for raw in raw_matches {
            if let Some(key) = self.normalize_target(raw.as_ref()) {
                if seen.insert(key.clone()) {
                    targets.push(key);
                }
            }
        }
        targets
    }

    /// Run `extractor` over `content` and return the ordered set of canonical targets.
    pub fn extract(&self, extractor: &dyn LinkExtractor, content: &[u8]) -> Vec<String> {
        self.collect(extractor.extract_links(content))
    }

    /// The written form of a reference to `to` that replaces `written`, when `written`
    /// resolves to `from`.
    ///
    /// Anchors, aliases, leading traversal markers and a leading root slash are kept. An
    /// extensionless reference stays extensionless and a percent-encoded one stays encoded.
    pub fn retarget(&self, written: &str, from: &str, to: &str) -> Option<String> {
        if self.normalize_target(written).as_deref() != Some(from) {
            return None;
        }
        let (traversal, path, suffix) = split_written_target(written.trim());
        let unrooted = path.trim_start_matches(['/', '\\']);
        let rooted = &path[..path.len() - unrooted.len()];
        let default_suffix = format!(".{}", self.default_extension);
        let mut target = match to.strip_suffix(&default_suffix) {
            Some(stem) if !self.recognized_extensions.contains(&extension(path)) => stem.to_string(),
            _ => to.to_string(),
        };
        if path.contains('%') {
            target = encode_key(&target);
        }
        Some(format!("{traversal}{rooted}{target}{suffix}"))
    }
}
