// src/relocate/mod.rs

//! Symbol relocation
//!
//! Moves third-party packages under a private prefix so the assembled
//! archive cannot clash with another copy of the same library on the class
//! path. A relocated entry gets a new path, and its content is rewritten
//! wherever it names a relocated type:
//!
//! - class files: constant-pool type references ([`classfile`])
//! - service descriptors and other text resources: type-name lines ([`resource`])
//! - the Log4j plugin cache: plugin class names
//!
//! The rule set is compiled once and shared read-only across worker threads.

pub mod classfile;
pub mod resource;
mod rules;

pub use classfile::{class_major_version, class_release, relocate_class, release_for_major, ClassFileError};
pub use resource::{looks_like_type_name, relocate_lines, TextResources, DEFAULT_TEXT_RESOURCES};
pub use rules::{RelocationRule, Relocator};

use crate::archive::ArchiveEntry;
use crate::error::{Error, Result};
use crate::merge::log4j::{PluginCache, PLUGIN_CACHE_PATH};
use std::borrow::Cow;
use tracing::trace;

/// Relocates whole archive entries: path and content
#[derive(Debug, Clone, Default)]
pub struct SymbolRelocator {
    rules: Relocator,
    text: TextResources,
}

impl SymbolRelocator {
    pub fn new(rules: Relocator, text: TextResources) -> Self {
        Self { rules, text }
    }

    pub fn rules(&self) -> &Relocator {
        &self.rules
    }

    /// Relocate one entry
    ///
    /// Directory entries only have their path rewritten. A class file that
    /// cannot be parsed is a hard error naming the module.
    pub fn relocate_entry(&self, mut entry: ArchiveEntry) -> Result<ArchiveEntry> {
        if self.rules.is_empty() {
            return Ok(entry);
        }

        if !entry.is_directory {
            if entry.is_class() {
                let relocated = relocate_class(&entry.bytes, &self.rules).map_err(|e| Error::MalformedClass {
                    path: entry.path.clone(),
                    module: entry.source_name(),
                    reason: e.to_string(),
                })?;
                if let Some(bytes) = relocated {
                    entry.bytes = bytes;
                }
            } else if entry.path == PLUGIN_CACHE_PATH {
                let mut cache = PluginCache::parse(&entry.bytes).map_err(|e| malformed(&entry, e))?;
                if cache.relocate(&self.rules) {
                    entry.bytes = cache.to_bytes().map_err(|e| malformed(&entry, e))?;
                }
            } else if self.text.matches(&entry.path)
                && let Some(bytes) = relocate_lines(&entry.bytes, &self.rules)
            {
                entry.bytes = bytes;
            }
        }

        if let Cow::Owned(path) = self.rules.relocate_path(&entry.path) {
            trace!("{} -> {}", entry.path, path);
            entry.path = path;
        }

        Ok(entry)
    }
}

fn malformed(entry: &ArchiveEntry, reason: impl ToString) -> Error {
    Error::MalformedResource {
        path: entry.path.clone(),
        module: entry.source_name(),
        reason: reason.to_string(),
    }
}
