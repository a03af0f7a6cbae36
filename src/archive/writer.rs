// src/archive/writer.rs

//! Writing the output archive
//!
//! The archive is built in a temporary file next to the destination and
//! renamed into place on [`ArchiveWriter::finish`], so a failed run never
//! leaves a partial archive behind.

use super::entry::{is_safe_entry_name, parent_directories, ArchiveEntry};
use crate::error::{Error, Result};
use crate::hash;
use chrono::{Datelike, Timelike};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Timestamp used when `SOURCE_DATE_EPOCH` is not set (2024-01-01T00:00:00Z)
pub const DEFAULT_EPOCH: i64 = 1_704_067_200;

/// File extensions that are already compressed and are stored as-is
const STORED_EXTENSIONS: &[&str] = &[
    "jar", "zip", "war", "ear", "gz", "tgz", "bz2", "xz", "zst", "7z", "png", "jpg", "jpeg", "gif",
    "webp", "ogg", "mp3",
];

/// Timestamp written for synthesized entries, and for every entry when
/// timestamps are normalized
///
/// Honors `SOURCE_DATE_EPOCH`. Values outside the zip date range fall back
/// to the default epoch.
pub fn reproducible_timestamp() -> zip::DateTime {
    let epoch = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_EPOCH);

    timestamp_from_epoch(epoch).unwrap_or_else(|| {
        warn!("SOURCE_DATE_EPOCH={} is outside the zip date range, using default", epoch);
        timestamp_from_epoch(DEFAULT_EPOCH).unwrap_or_default()
    })
}

/// Convert seconds since the Unix epoch to a zip timestamp
pub fn timestamp_from_epoch(seconds: i64) -> Option<zip::DateTime> {
    let dt = chrono::DateTime::from_timestamp(seconds, 0)?;
    let year = u16::try_from(dt.year()).ok()?;
    zip::DateTime::from_date_and_time(
        year,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
    )
    .ok()
}

/// Pick the compression method for an entry
///
/// Content that is already compressed (nested archives, images) and empty
/// files are stored; everything else is deflated.
pub fn compression_for(path: &str, bytes: &[u8]) -> CompressionMethod {
    if bytes.is_empty() {
        return CompressionMethod::Stored;
    }

    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if STORED_EXTENSIONS.contains(&extension.as_str()) {
        return CompressionMethod::Stored;
    }

    const MAGIC: &[&[u8]] = &[
        b"PK\x03\x04",
        b"\x1f\x8b",
        b"\x89PNG",
        b"\xff\xd8\xff",
        b"\x28\xb5\x2f\xfd",
        b"\xfd7zXZ",
    ];
    if MAGIC.iter().any(|magic| bytes.starts_with(magic)) {
        return CompressionMethod::Stored;
    }

    CompressionMethod::Deflated
}

/// Options controlling entry metadata in the output
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    /// Timestamp for synthesized entries
    pub timestamp: zip::DateTime,
    /// Ignore input timestamps and use `timestamp` everywhere
    pub normalize_timestamps: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            timestamp: reproducible_timestamp(),
            normalize_timestamps: false,
        }
    }
}

/// A finished archive on disk
#[derive(Debug, Clone)]
pub struct WrittenArchive {
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
    pub entry_count: usize,
}

/// Sequential writer for the output archive
pub struct ArchiveWriter {
    dest: PathBuf,
    temp: NamedTempFile,
    zip: ZipWriter<BufWriter<File>>,
    options: WriterOptions,
    files: HashSet<String>,
    directories: HashSet<String>,
}

impl ArchiveWriter {
    /// Start writing an archive that will land at `dest`
    pub fn create(dest: &Path, options: WriterOptions) -> Result<Self> {
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let temp = tempfile::Builder::new()
            .prefix(".jarforge-")
            .suffix(".tmp")
            .tempfile_in(&parent)?;
        let file = temp.as_file().try_clone()?;

        debug!("Writing {} via {}", dest.display(), temp.path().display());

        Ok(Self {
            dest: dest.to_path_buf(),
            temp,
            zip: ZipWriter::new(BufWriter::new(file)),
            options,
            files: HashSet::new(),
            directories: HashSet::new(),
        })
    }

    /// Number of entries written so far
    pub fn len(&self) -> usize {
        self.files.len() + self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a directory entry; repeated directories are ignored
    pub fn add_directory(&mut self, path: &str) -> Result<()> {
        self.ensure_parents(path)?;
        self.write_directory(path)
    }

    /// Add an entry, creating any missing parent directories first
    ///
    /// Writing the same file path twice is an error.
    pub fn add_entry(&mut self, entry: &ArchiveEntry) -> Result<()> {
        if entry.is_directory {
            return self.add_directory(&entry.path);
        }

        if !is_safe_entry_name(&entry.path) || entry.path.ends_with('/') {
            return Err(Error::Config(format!("invalid output entry path '{}'", entry.path)));
        }
        if self.files.contains(&entry.path) || self.directories.contains(&format!("{}/", entry.path)) {
            return Err(Error::DuplicateEntry(entry.path.clone()));
        }

        self.ensure_parents(&entry.path)?;

        let mut options = SimpleFileOptions::default()
            .compression_method(compression_for(&entry.path, &entry.bytes))
            .last_modified_time(self.timestamp_for(entry));
        if let Some(mode) = entry.unix_mode {
            options = options.unix_permissions(mode & 0o777);
        }

        self.zip
            .start_file(entry.path.as_str(), options)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        self.zip.write_all(&entry.bytes)?;
        self.files.insert(entry.path.clone());
        Ok(())
    }

    /// Add a file with no source metadata
    pub fn add_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        self.add_entry(&ArchiveEntry::file(path, bytes.to_vec()))
    }

    /// Finalize the central directory and move the archive into place
    pub fn finish(self) -> Result<WrittenArchive> {
        let entry_count = self.len();
        let mut writer = self
            .zip
            .finish()
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        self.temp
            .persist(&self.dest)
            .map_err(|e| Error::Io(e.error))?;

        let size = std::fs::metadata(&self.dest)?.len();
        let sha256 = hash::sha256_file(&self.dest)?;
        debug!("Wrote {} ({} entries, {} bytes)", self.dest.display(), entry_count, size);

        Ok(WrittenArchive {
            path: self.dest,
            size,
            sha256,
            entry_count,
        })
    }

    fn timestamp_for(&self, entry: &ArchiveEntry) -> zip::DateTime {
        if self.options.normalize_timestamps {
            return self.options.timestamp;
        }
        entry.modified.unwrap_or(self.options.timestamp)
    }

    fn ensure_parents(&mut self, path: &str) -> Result<()> {
        for parent in parent_directories(path) {
            self.write_directory(&parent)?;
        }
        Ok(())
    }

    fn write_directory(&mut self, path: &str) -> Result<()> {
        let path = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };
        if self.directories.contains(&path) {
            return Ok(());
        }
        if self.files.contains(path.trim_end_matches('/')) {
            return Err(Error::DuplicateEntry(path));
        }

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(self.options.timestamp);
        self.zip
            .add_directory(path.as_str(), options)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        self.directories.insert(path);
        Ok(())
    }
}
