use crate::{error::BuildonomyError, paths::PathNormalizer};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

/// File name of the per-corpus configuration, looked up at the corpus root.
pub const CONFIG_FILE_NAME: &str = "noet-index.toml";

/// Engine configuration. Every field has a default, so a partial (or missing) TOML file is
/// always valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Root or content-type prefixes stripped from every document key.
    pub strip_prefixes: Vec<String>,
    /// Extension appended to link targets that carry no recognized extension.
    pub default_extension: String,
    /// Extensions of text documents, which are run through a link extractor.
    pub document_extensions: BTreeSet<String>,
    /// Extensions of media documents, which are tracked for orphan detection.
    pub media_extensions: BTreeSet<String>,
    /// Raw link matches longer than this are discarded as malformed.
    pub max_link_length: usize,
    pub default_file_type: String,
    pub default_status: String,
    pub default_priority: String,
    /// Names of the manual categorization buckets carried on every record.
    pub buckets: Vec<String>,
    /// Directory (relative to the corpus root) holding metadata records for the filesystem
    /// store.
    pub metadata_dir: String,
    /// Directory (relative to the corpus root) holding aggregate cache entries for the
    /// filesystem store.
    pub cache_dir: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            strip_prefixes: Vec::new(),
            default_extension: "md".to_string(),
            document_extensions: ["md", "markdown", "org", "txt"]
                .into_iter()
                .map(String::from)
                .collect(),
            media_extensions: [
                "png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "mp3", "wav", "ogg", "mp4",
                "webm", "mov", "pdf",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_link_length: 512,
            default_file_type: "note".to_string(),
            default_status: "draft".to_string(),
            default_priority: "normal".to_string(),
            buckets: vec!["categories".to_string()],
            metadata_dir: ".noet/meta".to_string(),
            cache_dir: ".noet/cache".to_string(),
        }
    }
}

impl IndexConfig {
    pub fn normalizer(&self) -> PathNormalizer {
        PathNormalizer::new(self.strip_prefixes.iter().cloned())
    }

    /// Whether `ext` (lowercase, no dot) is an extension the pipeline accepts as-is on a link
    /// target.
    pub fn is_recognized_extension(&self, ext: &str) -> bool {
        self.document_extensions.contains(ext) || self.media_extensions.contains(ext)
    }

    pub fn is_media_extension(&self, ext: &str) -> bool {
        self.media_extensions.contains(ext)
    }
}

/// Reads and writes an [IndexConfig] as TOML.
#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }

    /// Provider for the conventional config file inside a corpus root.
    pub fn for_root<P: AsRef<Path>>(root: P) -> Self {
        TomlConfigProvider::new(root.as_ref().join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<IndexConfig, BuildonomyError> {
        tracing::debug!("Attempting to read index config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using default index config.");
            return Ok(IndexConfig::default());
        }
        let content = read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn store(&self, config: &IndexConfig) -> Result<(), BuildonomyError> {
        tracing::debug!("Attempting to write index config to: {:?}", &self.path);
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}
