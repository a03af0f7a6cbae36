// src/plan.rs

//! The finalized output plan
//!
//! An [`OutputPlan`] is everything the archive will contain, decided before
//! the first byte is written: the composed manifest, the resolved MERGE
//! entries in path order, and the embedded archives in module order. The
//! plan cannot change once built, and writing it is a single sequential
//! pass.

use crate::archive::{ArchiveEntry, ArchiveWriter, WriterOptions, WrittenArchive, MANIFEST_PATH};
use crate::dependencies::{Coordinate, Module};
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::progress::{Phase, ProgressTracker};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// A module stored as a nested archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedArchive {
    pub coordinate: Coordinate,
    pub origin: PathBuf,
    /// Path inside the output archive
    pub path: String,
}

impl EmbeddedArchive {
    /// Embed entry for an EMBED module, `None` for any other disposition
    pub fn from_module(module: &Module) -> Option<Self> {
        module.embed_path().map(|path| Self {
            coordinate: module.coordinate().clone(),
            origin: module.origin().to_path_buf(),
            path: path.to_string(),
        })
    }
}

/// Immutable description of the output archive
#[derive(Debug, Clone)]
pub struct OutputPlan {
    manifest: Manifest,
    entries: Vec<ArchiveEntry>,
    directories: Vec<String>,
    embeds: Vec<EmbeddedArchive>,
}

impl OutputPlan {
    /// Build a plan, rejecting any path claimed twice
    ///
    /// `entries` must already be deduplicated by the merge resolver; a
    /// second claim here can only come from an embedded archive landing on
    /// a merged path.
    pub fn new(
        manifest: Manifest,
        mut entries: Vec<ArchiveEntry>,
        directories: Vec<String>,
        embeds: Vec<EmbeddedArchive>,
    ) -> Result<Self> {
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let mut claimed: HashMap<&str, String> = HashMap::new();
        claimed.insert(MANIFEST_PATH, "<manifest>".to_string());
        for entry in &entries {
            if let Some(first) = claimed.insert(entry.path.as_str(), entry.source_name()) {
                return Err(Error::UnresolvedMergeConflict {
                    path: entry.path.clone(),
                    first,
                    second: entry.source_name(),
                });
            }
        }
        for embed in &embeds {
            if let Some(first) = claimed.insert(embed.path.as_str(), embed.coordinate.to_string()) {
                return Err(Error::UnresolvedMergeConflict {
                    path: embed.path.clone(),
                    first,
                    second: embed.coordinate.to_string(),
                });
            }
        }

        Ok(Self {
            manifest,
            entries,
            directories,
            embeds,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// MERGE content, sorted by path
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Directory entries carried over from the inputs
    pub fn directories(&self) -> &[String] {
        &self.directories
    }

    pub fn embeds(&self) -> &[EmbeddedArchive] {
        &self.embeds
    }

    /// Number of files the archive will hold, manifest included
    pub fn file_count(&self) -> usize {
        1 + self.entries.len() + self.embeds.len()
    }

    /// Every file path in write order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(MANIFEST_PATH)
            .chain(self.entries.iter().map(|e| e.path.as_str()))
            .chain(self.embeds.iter().map(|e| e.path.as_str()))
    }

    /// Write the archive to `dest`
    ///
    /// Order: manifest, MERGE entries by path, leftover input directories,
    /// then embedded archives. Nothing appears at `dest` unless every entry
    /// was written.
    pub fn write(
        &self,
        dest: &Path,
        options: WriterOptions,
        progress: &dyn ProgressTracker,
    ) -> Result<WrittenArchive> {
        progress.start_phase(Phase::Write, self.file_count() as u64);
        let mut writer = ArchiveWriter::create(dest, options)?;

        writer.add_file(MANIFEST_PATH, &self.manifest.to_bytes())?;
        progress.increment(1);

        for entry in &self.entries {
            writer.add_entry(entry)?;
            progress.increment(1);
        }
        for directory in &self.directories {
            writer.add_directory(directory)?;
        }

        for embed in &self.embeds {
            progress.set_message(&format!("embedding {}", embed.coordinate));
            let bytes = std::fs::read(&embed.origin).map_err(|_| Error::MissingModuleArtifact {
                coordinate: embed.coordinate.to_string(),
                path: embed.origin.display().to_string(),
            })?;
            let entry = ArchiveEntry::file(embed.path.as_str(), bytes).with_source(embed.coordinate.clone());
            writer.add_entry(&entry)?;
            progress.increment(1);
        }

        let written = writer.finish()?;
        progress.finish_phase(Phase::Write);
        info!(
            "Wrote {} ({} entries, {} bytes)",
            written.path.display(),
            written.entry_count,
            written.size
        );
        Ok(written)
    }
}
