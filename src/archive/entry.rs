// src/archive/entry.rs

//! Archive entries and entry path rules

use crate::dependencies::Coordinate;
use crate::hash::Fingerprint;

/// Path of the main manifest. Reserved for the composed manifest.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Prefix of release-specific entries in a multi-release archive
pub const VERSIONS_PREFIX: &str = "META-INF/versions/";

/// A single entry read from (or destined for) an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Forward-slash path; directories end with '/'
    pub path: String,
    pub bytes: Vec<u8>,
    /// Module that contributed this entry, if any
    pub source: Option<Coordinate>,
    pub is_directory: bool,
    /// Modification time as stored in the source archive
    pub modified: Option<zip::DateTime>,
    pub unix_mode: Option<u32>,
}

impl ArchiveEntry {
    /// A file entry with no source module and no metadata
    pub fn file(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
            source: None,
            is_directory: false,
            modified: None,
            unix_mode: None,
        }
    }

    /// A directory entry; a trailing '/' is added if missing
    pub fn directory(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self {
            path,
            bytes: Vec::new(),
            source: None,
            is_directory: true,
            modified: None,
            unix_mode: None,
        }
    }

    pub fn with_source(mut self, source: Coordinate) -> Self {
        self.source = Some(source);
        self
    }

    pub fn is_class(&self) -> bool {
        !self.is_directory && self.path.ends_with(".class")
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.bytes)
    }

    /// Display name of the contributing module
    pub fn source_name(&self) -> String {
        self.source
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "<assembly>".to_string())
    }
}

/// Check that an entry name is a relative forward-slash path with no `..` segments
pub fn is_safe_entry_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && !name.contains('\\')
        && !name.contains('\0')
        && name.split('/').all(|segment| segment != ".." && segment != ".")
}

/// Parent directory paths of an entry, outermost first, each ending in '/'
///
/// `a/b/C.class` yields `a/` and `a/b/`.
pub fn parent_directories(path: &str) -> Vec<String> {
    let trimmed = path.trim_end_matches('/');
    let mut parents = Vec::new();
    for (idx, ch) in trimmed.char_indices() {
        if ch == '/' {
            parents.push(trimmed[..=idx].to_string());
        }
    }
    parents
}

/// Split a `META-INF/versions/<n>/rest` path into its release and base path
pub fn split_versioned(path: &str) -> Option<(u32, &str)> {
    let rest = path.strip_prefix(VERSIONS_PREFIX)?;
    let (release, base) = rest.split_once('/')?;
    let release = release.parse().ok()?;
    Some((release, base))
}

/// Build a versioned path for a release
pub fn versioned_path(release: u32, base: &str) -> String {
    format!("{}{}/{}", VERSIONS_PREFIX, release, base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_entry_names() {
        assert!(is_safe_entry_name("com/google/gson/Gson.class"));
        assert!(is_safe_entry_name("META-INF/"));
        assert!(!is_safe_entry_name("../evil"));
        assert!(!is_safe_entry_name("a/../../b"));
        assert!(!is_safe_entry_name("/etc/passwd"));
        assert!(!is_safe_entry_name("a\\b"));
        assert!(!is_safe_entry_name(""));
    }

    #[test]
    fn test_parent_directories() {
        assert_eq!(
            parent_directories("com/google/Gson.class"),
            vec!["com/".to_string(), "com/google/".to_string()]
        );
        assert_eq!(parent_directories("com/google/"), vec!["com/".to_string()]);
        assert!(parent_directories("Top.class").is_empty());
    }

    #[test]
    fn test_versioned_path_split() {
        assert_eq!(
            split_versioned("META-INF/versions/9/a/B.class"),
            Some((9, "a/B.class"))
        );
        assert_eq!(split_versioned("META-INF/versions/x/a/B.class"), None);
        assert_eq!(split_versioned("a/B.class"), None);
        assert_eq!(versioned_path(11, "a/B.class"), "META-INF/versions/11/a/B.class");
    }

    #[test]
    fn test_directory_constructor_adds_slash() {
        let dir = ArchiveEntry::directory("com/google");
        assert_eq!(dir.path, "com/google/");
        assert!(dir.is_directory);
        assert!(!dir.is_class());
    }
}
