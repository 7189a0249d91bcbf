use std::{
    borrow::Cow,
    fmt::{Display, Formatter},
    path::{Component, Path, PathBuf, MAIN_SEPARATOR_STR},
};

/// Utility function to replace separators and convert to unicode (via to_string_lossy) on os path.
pub fn os_path_to_string<P: AsRef<Path>>(os_path_ref: P) -> String {
    let res = os_path_ref
        .as_ref()
        .components()
        .map(|c| match c {
            Component::RootDir => Cow::from("".to_string()),
            _ => c.as_os_str().to_string_lossy(),
        })
        .collect::<Vec<_>>()
        .join("/");
    tracing::trace!(
        "os_path_to_string: turned {:?} into {}",
        os_path_ref.as_ref().components(),
        res
    );
    res
}

pub fn string_to_os_path(path_string: &str) -> PathBuf {
    let res = PathBuf::from(path_string.replace('/', MAIN_SEPARATOR_STR));
    tracing::trace!("string_to_os_path: turned '{}' into {:?}", path_string, res);
    res
}

/// Borrowed view of a `/`-separated document key split into directory, file name and
/// extension. A trailing `#fragment` is ignored.
///
/// Unlike [std::path::Path] this never touches the OS, so keys and link targets split the same
/// way on every platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPath<'a> {
    pub path: &'a str,
    /// Index of the '/' separating directory from file name
    dir_sep: Option<usize>,
    /// Index of the '.' separating file stem from extension
    ext_sep: Option<usize>,
    /// Index of the '#' starting an anchor fragment
    anc_sep: Option<usize>,
}

impl<'a> KeyPath<'a> {
    pub fn new(path: &'a str) -> KeyPath<'a> {
        let anc_sep = path.find('#');
        let body_end = anc_sep.unwrap_or(path.len());
        let dir_sep = path[0..body_end].rfind('/');
        let name_start = dir_sep.map(|sep| sep + 1).unwrap_or(0);
        let ext_sep = path[name_start..body_end]
            .rfind('.')
            // Hidden files are not extension markers
            .filter(|idx| *idx > 0)
            .map(|idx| idx + name_start);

        KeyPath {
            path,
            dir_sep,
            ext_sep,
            anc_sep,
        }
    }

    /// Everything before the last separator, empty for root documents.
    pub fn dir(&self) -> &'a str {
        &self.path[0..self.dir_sep.unwrap_or(0)]
    }

    pub fn filename(&self) -> &'a str {
        let start_idx = self.dir_sep.map(|idx| idx + 1).unwrap_or(0);
        &self.path[start_idx..self.anc_sep.unwrap_or(self.path.len())]
    }

    pub fn filestem(&self) -> &'a str {
        let start_idx = self.dir_sep.map(|idx| idx + 1).unwrap_or(0);
        let stop_idx = self
            .ext_sep
            .unwrap_or_else(|| self.anc_sep.unwrap_or(self.path.len()));
        &self.path[start_idx..stop_idx]
    }

    /// File extension without the dot, anchor-aware.
    pub fn ext(&self) -> &'a str {
        let stop_idx = self.anc_sep.unwrap_or(self.path.len());
        let start_idx = self.ext_sep.map(|idx| idx + 1).unwrap_or(stop_idx);
        &self.path[start_idx..stop_idx]
    }

    /// Directory segments, outermost first.
    pub fn dir_segments(&self) -> impl Iterator<Item = &'a str> {
        self.dir().split('/').filter(|segment| !segment.is_empty())
    }
}

impl<'a, T: AsRef<str> + ?Sized> From<&'a T> for KeyPath<'a> {
    fn from(s: &'a T) -> KeyPath<'a> {
        KeyPath::new(s.as_ref())
    }
}

impl<'a> AsRef<str> for KeyPath<'a> {
    fn as_ref(&self) -> &str {
        self.path
    }
}

impl<'a> Display for KeyPath<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_path_parsing() {
        let kp = KeyPath::from("dir/file.md");
        assert_eq!(kp.dir(), "dir");
        assert_eq!(kp.filename(), "file.md");
        assert_eq!(kp.filestem(), "file");
        assert_eq!(kp.ext(), "md");

        let kp = KeyPath::from("network/dir/file.md#anchor");
        assert_eq!(kp.dir(), "network/dir");
        assert_eq!(kp.filename(), "file.md");
        assert_eq!(kp.ext(), "md");
        assert_eq!(
            kp.dir_segments().collect::<Vec<_>>(),
            vec!["network", "dir"]
        );

        let kp = KeyPath::from("root.md");
        assert_eq!(kp.dir(), "");
        assert_eq!(kp.dir_segments().count(), 0);
    }

    #[test]
    fn test_ext() {
        assert_eq!(KeyPath::new("file.md").ext(), "md");
        assert_eq!(KeyPath::new("file.md#anchor").ext(), "md");
        assert_eq!(KeyPath::new("dir/photo.png").ext(), "png");
        assert_eq!(KeyPath::new("noextension").ext(), "");
        assert_eq!(KeyPath::new(".hidden").ext(), "");
        assert_eq!(KeyPath::new("dir/.hidden").filestem(), ".hidden");
        assert_eq!(KeyPath::new("dir.v2/noext").ext(), "");
        assert_eq!(KeyPath::new("my.note.md").filestem(), "my.note");
    }

    #[test]
    fn test_os_path_round_trip() {
        let os_path = string_to_os_path("a/b/c.md");
        assert_eq!(os_path_to_string(&os_path), "a/b/c.md");
    }
}
