//! Canonical document keys.
//!
//! Every record key and every extracted link target goes through [PathNormalizer::normalize], so
//! the same logical document can never appear under two different keys. Normalization is
//! deliberately shallow: separators are canonicalized, configured root prefixes are stripped, and
//! empty or `.` segments are dropped, but `..` segments are kept as written.
pub mod path;

pub use path::{os_path_to_string, string_to_os_path, KeyPath};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathNormalizer {
    strip_prefixes: Vec<String>,
}

impl PathNormalizer {
    /// Build a normalizer stripping the given root or content-type prefixes (e.g. `docs/`,
    /// `content:`). Prefixes are themselves canonicalized so `docs`, `/docs/` and `docs\` all
    /// behave the same.
    pub fn new<I: IntoIterator<Item = String>>(prefixes: I) -> Self {
        let mut strip_prefixes = prefixes
            .into_iter()
            .map(|p| p.replace('\\', "/"))
            .map(|p| {
                let trimmed = p.trim_matches('/');
                if trimmed.ends_with(':') || trimmed.is_empty() || trimmed == "." {
                    trimmed.to_string()
                } else {
                    format!("{trimmed}/")
                }
            })
            .filter(|p| !p.is_empty() && p != ".")
            .collect::<Vec<_>>();
        // Longest first so `docs/notes/` wins over `docs/`
        strip_prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));
        strip_prefixes.dedup();
        PathNormalizer { strip_prefixes }
    }

    /// Turn any document identifier into its canonical key.
    ///
    /// `normalize(normalize(p)) == normalize(p)` for every `p`.
    pub fn normalize(&self, path: &str) -> String {
        let mut current = collapse(path);
        loop {
            let stripped = self
                .strip_prefixes
                .iter()
                .find_map(|prefix| current.strip_prefix(prefix.as_str()))
                .map(collapse);
            match stripped {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }
        current
    }
}

/// Canonicalize separators, drop empty and `.` segments, trim slashes.
fn collapse(path: &str) -> String {
    path.trim()
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize without stripping any root prefix.
pub fn normalize(path: &str) -> String {
    PathNormalizer::default().normalize(path)
}

/// The directory segments of a key (`a/b/c.md` -> `["a", "b"]`).
pub fn folders_of(key: &str) -> Vec<String> {
    KeyPath::new(key)
        .dir_segments()
        .map(|segment| segment.to_string())
        .collect()
}

/// Every folder-path prefix of a key (`a/b/c.md` -> `["a", "a/b"]`).
pub fn folder_prefixes_of(key: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut acc = String::new();
    for segment in KeyPath::new(key).dir_segments() {
        if !acc.is_empty() {
            acc.push('/');
        }
        acc.push_str(segment);
        prefixes.push(acc.clone());
    }
    prefixes
}

/// The collection a document belongs to: its outermost folder, empty for root documents.
pub fn collection_of(key: &str) -> String {
    KeyPath::new(key)
        .dir_segments()
        .next()
        .unwrap_or_default()
        .to_string()
}

pub fn file_name(key: &str) -> &str {
    KeyPath::new(key).filename()
}

pub fn file_stem(key: &str) -> &str {
    KeyPath::new(key).filestem()
}

/// Lowercased extension without the dot.
pub fn extension(key: &str) -> String {
    KeyPath::new(key).ext().to_lowercase()
}
