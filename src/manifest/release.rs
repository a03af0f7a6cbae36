// src/manifest/release.rs

//! Multi-release tiering
//!
//! A class built for a newer platform release is moved under
//! `META-INF/versions/<N>/` so older runtimes never load it. A module can
//! be pinned to a tier as a whole (a `java9` source set, say); otherwise
//! classes are tiered one by one when their class-file version exceeds the
//! configured base release.

use crate::archive::{split_versioned, versioned_path, ArchiveEntry};
use crate::error::{Error, Result};
use crate::relocate::class_release;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// The `[multi_release]` table of the assembly configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiReleaseConfig {
    /// Release the unversioned tree targets; classes above it are tiered
    pub base_release: Option<u32>,
    /// Fail when a tiered class has no unversioned counterpart
    pub require_fallback: bool,
}

impl Default for MultiReleaseConfig {
    fn default() -> Self {
        Self {
            base_release: None,
            require_fallback: true,
        }
    }
}

/// Decides which tier an entry belongs to
#[derive(Debug, Clone, Default)]
pub struct ReleaseTiering {
    config: MultiReleaseConfig,
}

impl ReleaseTiering {
    pub fn new(config: MultiReleaseConfig) -> Self {
        Self { config }
    }

    /// Tier for an entry, or `None` to keep it in the base tree
    ///
    /// Entries already under a version prefix and anything in `META-INF/`
    /// stay where they are.
    pub fn tier_for(&self, module_release: Option<u32>, entry: &ArchiveEntry) -> Option<u32> {
        if entry.is_directory || entry.path.starts_with("META-INF/") {
            return None;
        }
        let above_base = |release: u32| self.config.base_release.is_none_or(|base| release > base);

        if let Some(release) = module_release {
            return above_base(release).then_some(release);
        }

        if !entry.is_class() {
            return None;
        }
        let base = self.config.base_release?;
        class_release(&entry.bytes).filter(|&release| release > base)
    }

    /// Move an entry into its tier; returns the tier it was placed in
    pub fn place(&self, module_release: Option<u32>, mut entry: ArchiveEntry) -> (ArchiveEntry, Option<u32>) {
        let tier = self.tier_for(module_release, &entry);
        if let Some(release) = tier {
            let path = versioned_path(release, &entry.path);
            debug!("Tiering {} to release {}", entry.path, release);
            entry.path = path;
        }
        (entry, tier)
    }

    /// Check that every class we tiered has an unversioned fallback
    ///
    /// `tiered` holds the output paths of entries moved by [`Self::place`];
    /// `entries` is the final content of the output.
    pub fn check_fallbacks(&self, tiered: &BTreeSet<String>, entries: &[ArchiveEntry]) -> Result<()> {
        if !self.config.require_fallback {
            return Ok(());
        }

        let present: HashSet<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        for path in tiered {
            let Some((release, base)) = split_versioned(path) else {
                continue;
            };
            if !base.ends_with(".class") || !present.contains(path.as_str()) {
                continue;
            }
            if !present.contains(base) {
                return Err(Error::MissingReleaseFallback {
                    path: base.to_string(),
                    release,
                });
            }
        }
        Ok(())
    }
}

/// Whether an output holds any versioned entries
pub fn is_multi_release<'a>(paths: impl IntoIterator<Item = &'a str>) -> bool {
    paths
        .into_iter()
        .any(|p| split_versioned(p).is_some_and(|(_, base)| !base.is_empty()))
}
