// src/archive/reader.rs

//! Reading module archives and class directories
//!
//! Entries are yielded lazily, one at a time, with their full content. A
//! malformed central directory, an unsafe entry name, or a CRC mismatch
//! surfaces as [`Error::CorruptArchive`] naming the archive.

use super::entry::{is_safe_entry_name, ArchiveEntry};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Reader over a single zip-format archive
pub struct ArchiveReader {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
}

impl ArchiveReader {
    /// Open an archive and read its central directory
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| Error::corrupt(path.display().to_string(), e))?;

        debug!("Opened {} ({} entries)", path.display(), archive.len());

        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries in the central directory
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Iterate entries in central directory order
    pub fn entries(&mut self) -> Entries<'_> {
        Entries {
            reader: self,
            index: 0,
        }
    }

    /// Read every entry into memory
    pub fn read_all(&mut self) -> Result<Vec<ArchiveEntry>> {
        self.entries().collect()
    }

    /// Read a single entry by name, if present
    pub fn read_entry(&mut self, name: &str) -> Result<Option<ArchiveEntry>> {
        match self.archive.index_for_name(name) {
            Some(index) => self.read_index(index).map(Some),
            None => Ok(None),
        }
    }

    fn read_index(&mut self, index: usize) -> Result<ArchiveEntry> {
        let origin = self.path.display().to_string();
        let mut file = self
            .archive
            .by_index(index)
            .map_err(|e| Error::corrupt(&origin, e))?;

        let name = file.name().to_string();
        if !is_safe_entry_name(&name) {
            return Err(Error::corrupt(
                &origin,
                format!("unsafe entry name '{}'", name),
            ));
        }

        let is_directory = file.is_dir();
        let modified = file.last_modified();
        let unix_mode = file.unix_mode();

        let mut bytes = Vec::new();
        if !is_directory {
            bytes.reserve(file.size().min(64 * 1024 * 1024) as usize);
            file.read_to_end(&mut bytes)
                .map_err(|e| Error::corrupt(&origin, format!("{}: {}", name, e)))?;
        }

        trace!("Read {} ({} bytes) from {}", name, bytes.len(), origin);

        Ok(ArchiveEntry {
            path: name,
            bytes,
            source: None,
            is_directory,
            modified,
            unix_mode,
        })
    }
}

/// Lazy iterator over the entries of an [`ArchiveReader`]
pub struct Entries<'a> {
    reader: &'a mut ArchiveReader,
    index: usize,
}

impl Iterator for Entries<'_> {
    type Item = Result<ArchiveEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.reader.len() {
            return None;
        }
        let entry = self.reader.read_index(self.index);
        self.index += 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.reader.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

/// Read a class directory as if it were an archive
///
/// Entries come back sorted by path so the result does not depend on
/// filesystem iteration order.
pub fn read_directory(root: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();

    for item in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let item = item.map_err(|e| Error::Io(e.into()))?;
        let relative = match item.path().strip_prefix(root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };

        let mut name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if item.file_type().is_dir() {
            name.push('/');
            entries.push(ArchiveEntry::directory(name));
        } else if item.file_type().is_file() {
            let bytes = std::fs::read(item.path())?;
            entries.push(ArchiveEntry::file(name, bytes));
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("Read {} entries from directory {}", entries.len(), root.display());
    Ok(entries)
}

/// Read every entry of a module origin, archive or directory
pub fn read_origin(origin: &Path) -> Result<Vec<ArchiveEntry>> {
    if origin.is_dir() {
        read_directory(origin)
    } else {
        ArchiveReader::open(origin)?.read_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_read_entries_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("a.jar");
        write_jar(
            &jar,
            &[("com/", b""), ("com/A.class", b"\xca\xfe"), ("readme.txt", b"hi")],
        );

        let mut reader = ArchiveReader::open(&jar).unwrap();
        assert_eq!(reader.len(), 3);

        let entries = reader.read_all().unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(names, vec!["com/", "com/A.class", "readme.txt"]);
        assert!(entries[0].is_directory);
        assert_eq!(entries[1].bytes, b"\xca\xfe");
        assert!(entries[1].modified.is_some());
    }

    #[test]
    fn test_read_single_entry() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("a.jar");
        write_jar(&jar, &[("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n")]);

        let mut reader = ArchiveReader::open(&jar).unwrap();
        let manifest = reader.read_entry("META-INF/MANIFEST.MF").unwrap().unwrap();
        assert!(manifest.bytes.starts_with(b"Manifest-Version"));
        assert!(reader.read_entry("missing").unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_corrupt_archive() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("broken.jar");
        std::fs::write(&jar, b"this is not a zip file at all").unwrap();

        match ArchiveReader::open(&jar) {
            Err(Error::CorruptArchive { path, .. }) => assert!(path.contains("broken.jar")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("garbage opened as an archive"),
        }
    }

    #[test]
    fn test_unsafe_entry_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("evil.jar");
        write_jar(&jar, &[("../escape.txt", b"x")]);

        let mut reader = ArchiveReader::open(&jar).unwrap();
        let result = reader.read_all();
        assert!(matches!(result, Err(Error::CorruptArchive { .. })));
    }

    #[test]
    fn test_read_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b/c")).unwrap();
        std::fs::write(dir.path().join("b/c/Z.class"), b"z").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let entries = read_directory(dir.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b/", "b/c/", "b/c/Z.class"]);
    }
}
