//! Plain-filesystem collaborators: documents live in a directory tree, metadata and cache
//! entries are one JSON file per key.
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

use super::{CacheStore, ContentSource, DocumentEntry, MetadataStore};
use crate::{
    config::CONFIG_FILE_NAME,
    error::BuildonomyError,
    paths::{file_name, os_path_to_string, string_to_os_path},
    properties::{unix_seconds, FileStat},
};

/// A document corpus rooted at a directory. Dot-directories (`.git`, `.noet`, ...), dot-files
/// and the root configuration file are not part of the corpus.
#[derive(Debug, Clone)]
pub struct FsContent {
    root: PathBuf,
}

impl FsContent {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        FsContent {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn os_path(&self, key: &str) -> PathBuf {
        self.root.join(string_to_os_path(key))
    }
}

fn ensure_parent(path: &Path) -> Result<(), BuildonomyError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl ContentSource for FsContent {
    fn read(&self, key: &str) -> Result<Vec<u8>, BuildonomyError> {
        tracing::trace!("[FsContent::read] {}", key);
        Ok(fs::read(self.os_path(key))?)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), BuildonomyError> {
        let path = self.os_path(key);
        ensure_parent(&path)?;
        Ok(fs::write(path, bytes)?)
    }

    fn stat(&self, key: &str) -> Result<FileStat, BuildonomyError> {
        let metadata = fs::metadata(self.os_path(key))?;
        if !metadata.is_file() {
            return Err(BuildonomyError::NotFound(format!(
                "'{key}' is not a regular file"
            )));
        }
        let modified = metadata.modified().map(unix_seconds).unwrap_or(0);
        // Not every platform/filesystem records birth time
        let created = metadata.created().map(unix_seconds).unwrap_or(modified);
        Ok(FileStat {
            size: metadata.len(),
            created,
            modified,
        })
    }

    fn list(&self) -> Result<Vec<DocumentEntry>, BuildonomyError> {
        let mut entries = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                entry.depth() == 0
                    || !(name.starts_with('.') || (entry.depth() == 1 && name == CONFIG_FILE_NAME))
            });
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.root)?;
            let key = os_path_to_string(relative);
            entries.push(DocumentEntry {
                name: file_name(&key).to_string(),
                path: key,
            });
        }
        Ok(entries)
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), BuildonomyError> {
        let to_path = self.os_path(to);
        ensure_parent(&to_path)?;
        Ok(fs::rename(self.os_path(from), to_path)?)
    }

    fn remove(&self, key: &str) -> Result<(), BuildonomyError> {
        Ok(fs::remove_file(self.os_path(key))?)
    }
}

/// One JSON file per key inside `dir`, nested the way the key is. Each key segment becomes one
/// path component, so file names stay as short as the document names they come from.
#[derive(Debug, Clone)]
pub struct FsKv {
    dir: PathBuf,
}

const ENTRY_EXT: &str = ".json";
const STAGING_EXT: &str = "json.tmp";

/// Percent-encode the ASCII characters that are unsafe in a file name. Non-ASCII text is kept
/// as is, and a leading `.` is encoded so no segment is hidden or a traversal.
fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for (idx, ch) in segment.char_indices() {
        let keep = !ch.is_ascii()
            || ch.is_ascii_alphanumeric()
            || matches!(ch, '-' | '_' | ' ' | '~')
            || (ch == '.' && idx > 0);
        if keep {
            encoded.push(ch);
        } else {
            encoded.push_str(&urlencoding::encode(ch.encode_utf8(&mut [0; 4])));
        }
    }
    encoded
}

impl FsKv {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, BuildonomyError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(FsKv {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let segments = key.split('/').collect::<Vec<_>>();
        let mut path = self.dir.clone();
        for (idx, segment) in segments.iter().enumerate() {
            let mut encoded = encode_segment(segment);
            if idx + 1 == segments.len() {
                encoded.push_str(ENTRY_EXT);
            } else if let Some(stem) = encoded.strip_suffix(ENTRY_EXT) {
                // A directory must not share its name with a sibling entry file
                encoded = format!("{stem}%2Ejson");
            }
            path.push(encoded);
        }
        path
    }

    /// The key stored at `path`, a file below `dir`.
    fn entry_key(&self, path: &Path) -> Result<Option<String>, BuildonomyError> {
        let relative = os_path_to_string(path.strip_prefix(&self.dir)?);
        let Some(encoded) = relative.strip_suffix(ENTRY_EXT) else {
            return Ok(None);
        };
        let mut segments = Vec::new();
        for segment in encoded.split('/') {
            match urlencoding::decode(segment) {
                Ok(decoded) => segments.push(decoded.into_owned()),
                Err(e) => {
                    tracing::warn!(
                        "[FsKv::entry_key] Skipping undecodable entry {:?}: {}",
                        relative,
                        e
                    );
                    return Ok(None);
                }
            }
        }
        Ok(Some(segments.join("/")))
    }

    fn read_entry(&self, key: &str) -> Result<Option<Vec<u8>>, BuildonomyError> {
        match fs::read(self.entry_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_entry(&self, key: &str, bytes: &[u8]) -> Result<(), BuildonomyError> {
        // Write-then-rename so readers never observe a half-written entry
        let target = self.entry_path(key);
        ensure_parent(&target)?;
        let staging = target.with_extension(STAGING_EXT);
        let written = fs::write(&staging, bytes).and_then(|()| fs::rename(&staging, &target));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&staging) {
                tracing::debug!(
                    "[FsKv::write_entry] Could not remove staging file {:?}: {}",
                    staging,
                    cleanup
                );
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove directories left empty below `dir` after deleting `path`.
    fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(parent) = current {
            if parent == self.dir.as_path() || fs::remove_dir(parent).is_err() {
                break;
            }
            current = parent.parent();
        }
    }
}

impl MetadataStore for FsKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BuildonomyError> {
        self.read_entry(key)
    }

    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), BuildonomyError> {
        self.write_entry(key, bytes)
    }

    fn delete(&self, key: &str) -> Result<(), BuildonomyError> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                self.prune_empty_parents(&path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, BuildonomyError> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.dir).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            match self.entry_key(entry.path())? {
                Some(key) if key.starts_with(prefix) => keys.push(key),
                _ => {}
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl CacheStore for FsKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BuildonomyError> {
        self.read_entry(key)
    }

    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), BuildonomyError> {
        self.write_entry(key, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn content_listing_skips_hidden_entries() {
        let dir = tempdir().unwrap();
        let content = FsContent::new(dir.path());
        content.write("notes/a.md", b"# A").unwrap();
        content.write("b.md", b"# B").unwrap();
        content.write(".noet/meta/x.json", b"{}").unwrap();
        content.write("notes/.draft.md", b"").unwrap();
        content.write(CONFIG_FILE_NAME, b"").unwrap();
        let paths = content
            .list()
            .unwrap()
            .into_iter()
            .map(|entry| entry.path)
            .collect::<Vec<_>>();
        assert_eq!(paths, vec!["b.md", "notes/a.md"]);
    }

    #[test]
    fn content_rename_creates_directories() {
        let dir = tempdir().unwrap();
        let content = FsContent::new(dir.path());
        content.write("old/note.md", b"body").unwrap();
        content.rename("old/note.md", "new/deeper/note.md").unwrap();
        assert!(!content.exists("old/note.md"));
        assert_eq!(content.read("new/deeper/note.md").unwrap(), b"body");
        assert_eq!(content.stat("new/deeper/note.md").unwrap().size, 4);
    }

    #[test]
    fn kv_round_trips_nested_keys() {
        let dir = tempdir().unwrap();
        let kv = FsKv::new(dir.path().join("meta")).unwrap();
        MetadataStore::set(&kv, "a/b c.md", b"1").unwrap();
        MetadataStore::set(&kv, "a.md", b"2").unwrap();
        MetadataStore::set(&kv, "z.md", b"3").unwrap();
        assert_eq!(
            MetadataStore::get(&kv, "a/b c.md").unwrap(),
            Some(b"1".to_vec())
        );
        assert_eq!(
            MetadataStore::list(&kv, "a").unwrap(),
            vec!["a.md".to_string(), "a/b c.md".to_string()]
        );
        MetadataStore::delete(&kv, "a.md").unwrap();
        MetadataStore::delete(&kv, "a.md").unwrap();
        assert_eq!(MetadataStore::get(&kv, "a.md").unwrap(), None);
        assert!(dir.path().join("meta/a/b c.md.json").is_file());
    }

    #[test]
    fn kv_file_names_stay_short_for_deep_and_non_ascii_keys() {
        let dir = tempdir().unwrap();
        let kv = FsKv::new(dir.path().join("meta")).unwrap();
        let deep = format!("{}/note.md", vec!["section"; 60].join("/"));
        let wide = format!("notizen/{}.md", "ü".repeat(100));
        let odd = "a.json/../.hidden/50%.md";
        for key in [deep.as_str(), wide.as_str(), odd] {
            MetadataStore::set(&kv, key, key.as_bytes()).unwrap();
            assert_eq!(
                MetadataStore::get(&kv, key).unwrap(),
                Some(key.as_bytes().to_vec())
            );
        }
        MetadataStore::set(&kv, "a", b"file beside a directory").unwrap();
        let mut expected = vec![deep.clone(), wide.clone(), odd.to_string(), "a".to_string()];
        expected.sort();
        assert_eq!(MetadataStore::list(&kv, "").unwrap(), expected);

        for key in [deep.as_str(), wide.as_str(), odd, "a"] {
            MetadataStore::delete(&kv, key).unwrap();
        }
        assert!(MetadataStore::list(&kv, "").unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path().join("meta")).unwrap().count(), 0);
    }

    #[test]
    fn kv_failed_write_leaves_no_staging_file() {
        let dir = tempdir().unwrap();
        let kv = FsKv::new(dir.path().join("meta")).unwrap();
        // A directory in the way makes the final rename fail
        std::fs::create_dir_all(dir.path().join("meta/blocked.md.json/inner")).unwrap();
        assert!(MetadataStore::set(&kv, "blocked.md", b"{}").is_err());
        assert!(!dir.path().join("meta/blocked.md.json.tmp").exists());
    }
}
