// src/merge/log4j.rs

//! Log4j 2 plugin cache (`Log4j2Plugins.dat`) codec
//!
//! The cache is written by Java's `DataOutputStream`:
//!
//! ```text
//! int categoryCount
//! repeat categoryCount:
//!     utf  category
//!     int  entryCount
//!     repeat entryCount:
//!         utf  key
//!         utf  className
//!         utf  name
//!         bool printable
//!         bool defer
//! ```
//!
//! `utf` is a u2 byte length followed by modified UTF-8. Categories are
//! keyed case-insensitively; when two caches define the same plugin key in
//! a category, the first one wins.

use super::{ContentMerger, MergeStrategy};
use crate::archive::ArchiveEntry;
use crate::error::Result;
use crate::mutf8;
use crate::relocate::Relocator;
use std::collections::BTreeMap;
use thiserror::Error;

/// Path of the plugin cache inside an archive
pub const PLUGIN_CACHE_PATH: &str =
    "META-INF/org/apache/logging/log4j/core/config/plugins/Log4j2Plugins.dat";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PluginCacheError {
    #[error("truncated at byte {0}")]
    Truncated(usize),

    #[error("negative count {count} at byte {offset}")]
    NegativeCount { count: i32, offset: usize },

    #[error("invalid string at byte {0}")]
    InvalidString(usize),

    #[error("string of {0} bytes is too long to encode")]
    StringTooLong(usize),

    #[error("{0} trailing bytes after the last category")]
    TrailingBytes(usize),
}

type CacheResult<T> = std::result::Result<T, PluginCacheError>;

/// One registered plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEntry {
    pub key: String,
    pub class_name: String,
    pub name: String,
    pub printable: bool,
    pub defer: bool,
}

/// A parsed plugin cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginCache {
    categories: BTreeMap<String, BTreeMap<String, PluginEntry>>,
}

impl PluginCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(bytes: &[u8]) -> CacheResult<Self> {
        let mut input = DataInput { data: bytes, pos: 0 };
        let mut cache = Self::new();

        let categories = input.count()?;
        for _ in 0..categories {
            let category = input.utf()?.to_lowercase();
            let entries = input.count()?;
            let map = cache.categories.entry(category).or_default();
            for _ in 0..entries {
                let entry = PluginEntry {
                    key: input.utf()?,
                    class_name: input.utf()?,
                    name: input.utf()?,
                    printable: input.boolean()?,
                    defer: input.boolean()?,
                };
                map.entry(entry.key.clone()).or_insert(entry);
            }
        }

        let remaining = bytes.len() - input.pos;
        if remaining != 0 {
            return Err(PluginCacheError::TrailingBytes(remaining));
        }
        Ok(cache)
    }

    /// Add every entry of `other` that this cache does not define yet
    pub fn merge(&mut self, other: &PluginCache) {
        for (category, entries) in &other.categories {
            let map = self.categories.entry(category.clone()).or_default();
            for (key, entry) in entries {
                map.entry(key.clone()).or_insert_with(|| entry.clone());
            }
        }
    }

    /// Rewrite plugin class names through relocation rules; returns true if any changed
    pub fn relocate(&mut self, relocator: &Relocator) -> bool {
        let mut changed = false;
        for entry in self.categories.values_mut().flat_map(|m| m.values_mut()) {
            if let std::borrow::Cow::Owned(relocated) = relocator.relocate_type_name(&entry.class_name) {
                entry.class_name = relocated;
                changed = true;
            }
        }
        changed
    }

    pub fn category(&self, name: &str) -> Option<&BTreeMap<String, PluginEntry>> {
        self.categories.get(&name.to_lowercase())
    }

    /// Total number of plugin entries across categories
    pub fn len(&self) -> usize {
        self.categories.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_bytes(&self) -> CacheResult<Vec<u8>> {
        let mut out = Vec::new();
        write_int(&mut out, self.categories.len())?;
        for (category, entries) in &self.categories {
            write_utf(&mut out, category)?;
            write_int(&mut out, entries.len())?;
            for entry in entries.values() {
                write_utf(&mut out, &entry.key)?;
                write_utf(&mut out, &entry.class_name)?;
                write_utf(&mut out, &entry.name)?;
                out.push(entry.printable as u8);
                out.push(entry.defer as u8);
            }
        }
        Ok(out)
    }
}

/// Combines the plugin caches of every contribution into one
pub struct PluginCacheMerge;

impl ContentMerger for PluginCacheMerge {
    fn strategy(&self) -> MergeStrategy {
        MergeStrategy::Log4jPluginCacheMerge
    }

    fn merge(&self, path: &str, parts: &[&ArchiveEntry]) -> Result<Vec<u8>> {
        let malformed = |part: &ArchiveEntry, e: PluginCacheError| crate::Error::MalformedResource {
            path: path.to_string(),
            module: part.source_name(),
            reason: e.to_string(),
        };

        let mut combined = PluginCache::new();
        for &part in parts {
            let cache = PluginCache::parse(&part.bytes).map_err(|e| malformed(part, e))?;
            combined.merge(&cache);
        }

        match parts.first() {
            Some(&first) => combined.to_bytes().map_err(|e| malformed(first, e)),
            None => combined.to_bytes().map_err(|e| crate::Error::Config(e.to_string())),
        }
    }
}

fn write_int(out: &mut Vec<u8>, value: usize) -> CacheResult<()> {
    let value = i32::try_from(value).map_err(|_| PluginCacheError::StringTooLong(value))?;
    out.extend_from_slice(&value.to_be_bytes());
    Ok(())
}

fn write_utf(out: &mut Vec<u8>, value: &str) -> CacheResult<()> {
    let encoded = mutf8::encode(value);
    let len = u16::try_from(encoded.len()).map_err(|_| PluginCacheError::StringTooLong(encoded.len()))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&encoded);
    Ok(())
}

struct DataInput<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DataInput<'_> {
    fn take(&mut self, n: usize) -> CacheResult<&[u8]> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(PluginCacheError::Truncated(self.pos));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn count(&mut self) -> CacheResult<usize> {
        let offset = self.pos;
        let b = self.take(4)?;
        let count = i32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        usize::try_from(count).map_err(|_| PluginCacheError::NegativeCount { count, offset })
    }

    fn utf(&mut self) -> CacheResult<String> {
        let offset = self.pos;
        let b = self.take(2)?;
        let len = u16::from_be_bytes([b[0], b[1]]) as usize;
        let raw = self.take(len)?;
        mutf8::decode(raw).map_err(|_| PluginCacheError::InvalidString(offset))
    }

    fn boolean(&mut self) -> CacheResult<bool> {
        Ok(self.take(1)?[0] != 0)
    }
}
