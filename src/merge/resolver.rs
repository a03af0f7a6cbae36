// src/merge/resolver.rs

//! The output path map
//!
//! Contributions arrive in module order. Each output path is claimed with a
//! single check-then-set on the map, so the first contribution to a path is
//! always the first in module order, whatever order the modules were read in.

use super::strategy::{BindingTable, MergeStrategy};
use super::merger_for;
use crate::archive::ArchiveEntry;
use crate::error::{Error, Result};
use crate::hash::Fingerprint;
use crate::report::{EntryFate, EntryRecord};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

enum Slot {
    /// No binding: a second contribution must be byte-identical
    Unbound {
        entry: ArchiveEntry,
        fingerprint: Fingerprint,
    },
    FirstWins {
        entry: ArchiveEntry,
    },
    Combined {
        strategy: MergeStrategy,
        parts: Vec<ArchiveEntry>,
        /// Ledger indices of the contributions
        records: Vec<usize>,
    },
}

/// Final content of every output path
#[derive(Debug, Default)]
pub struct ResolvedEntries {
    /// File entries, sorted by path
    pub entries: Vec<ArchiveEntry>,
    /// Directory entries seen in the input, sorted
    pub directories: Vec<String>,
    /// One ledger line per file contribution, in offer order
    pub records: Vec<EntryRecord>,
}

/// Applies merge bindings to contributions in module order
pub struct MergeResolver<'a> {
    bindings: &'a BindingTable,
    slots: BTreeMap<String, Slot>,
    directories: BTreeSet<String>,
    records: Vec<EntryRecord>,
}

impl<'a> MergeResolver<'a> {
    pub fn new(bindings: &'a BindingTable) -> Self {
        Self {
            bindings,
            slots: BTreeMap::new(),
            directories: BTreeSet::new(),
            records: Vec::new(),
        }
    }

    /// Record an entry that was removed before reaching the resolver
    pub fn record_excluded(&mut self, source_path: &str, entry: &ArchiveEntry, rule: String) {
        self.records.push(EntryRecord {
            module: entry.source_name(),
            source_path: source_path.to_string(),
            final_path: entry.path.clone(),
            fate: EntryFate::Excluded { rule },
        });
    }

    /// Offer one relocated entry
    ///
    /// `source_path` is the entry's path inside its module, before relocation.
    pub fn offer(&mut self, source_path: &str, entry: ArchiveEntry) -> Result<()> {
        if entry.is_directory {
            self.directories.insert(entry.path);
            return Ok(());
        }

        let module = entry.source_name();
        let mut record = EntryRecord {
            module: module.clone(),
            source_path: source_path.to_string(),
            final_path: entry.path.clone(),
            fate: EntryFate::Written,
        };

        let binding = self.bindings.lookup(&entry.path);
        let strategy = binding.map(|b| b.strategy());

        if strategy == Some(MergeStrategy::Exclude) {
            let rule = binding.map(|b| b.describe()).unwrap_or_default();
            debug!("Excluding {} from {} ({})", entry.path, module, rule);
            record.fate = EntryFate::Excluded { rule };
            self.records.push(record);
            return Ok(());
        }

        let index = self.records.len();
        match self.slots.entry(entry.path.clone()) {
            Entry::Vacant(vacant) => {
                let slot = match strategy {
                    None => Slot::Unbound {
                        fingerprint: entry.fingerprint(),
                        entry,
                    },
                    Some(MergeStrategy::FirstWins) => Slot::FirstWins { entry },
                    Some(strategy) => {
                        record.fate = EntryFate::Merged { strategy };
                        Slot::Combined {
                            strategy,
                            parts: vec![entry],
                            records: vec![index],
                        }
                    }
                };
                vacant.insert(slot);
            }
            Entry::Occupied(mut occupied) => match occupied.get_mut() {
                Slot::Unbound {
                    entry: kept,
                    fingerprint,
                } => {
                    if *fingerprint == entry.fingerprint() && kept.bytes == entry.bytes {
                        warn!(
                            "{} is contributed identically by {} and {}; keeping one copy",
                            entry.path,
                            kept.source_name(),
                            module
                        );
                        record.fate = EntryFate::Collapsed {
                            kept_from: kept.source_name(),
                        };
                    } else {
                        return Err(Error::UnresolvedMergeConflict {
                            path: entry.path,
                            first: kept.source_name(),
                            second: module,
                        });
                    }
                }
                Slot::FirstWins { entry: kept } => {
                    debug!("{}: keeping {} over {}", entry.path, kept.source_name(), module);
                    record.fate = EntryFate::Dropped {
                        kept_from: kept.source_name(),
                    };
                }
                Slot::Combined {
                    strategy,
                    parts,
                    records,
                } => {
                    record.fate = EntryFate::Merged {
                        strategy: *strategy,
                    };
                    parts.push(entry);
                    records.push(index);
                }
            },
        }

        self.records.push(record);
        Ok(())
    }

    /// Number of distinct output file paths claimed so far
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Produce the final content of every path
    ///
    /// Mergers only run when a path has two or more contributions. A path
    /// bound to a combining strategy with a single contribution keeps that
    /// contribution's bytes exactly, duplicate lines included, so upstream
    /// files are never rewritten just for being present.
    pub fn finish(mut self) -> Result<ResolvedEntries> {
        let mut entries = Vec::with_capacity(self.slots.len());

        for (path, slot) in self.slots {
            match slot {
                Slot::Unbound { entry, .. } | Slot::FirstWins { entry } => entries.push(entry),
                Slot::Combined {
                    strategy,
                    mut parts,
                    records,
                } => {
                    if parts.len() == 1 {
                        for index in records {
                            self.records[index].fate = EntryFate::Written;
                        }
                        entries.extend(parts.pop());
                        continue;
                    }

                    let merger = merger_for(strategy).ok_or_else(|| {
                        Error::Config(format!("strategy {} cannot combine content", strategy))
                    })?;
                    let refs: Vec<&ArchiveEntry> = parts.iter().collect();
                    let bytes = merger.merge(&path, &refs)?;
                    debug!("Merged {} contributions to {} ({})", parts.len(), path, strategy);

                    let mut merged = ArchiveEntry::file(path, bytes);
                    merged.source = parts.first().and_then(|p| p.source.clone());
                    entries.push(merged);
                }
            }
        }

        Ok(ResolvedEntries {
            entries,
            directories: self.directories.into_iter().collect(),
            records: self.records,
        })
    }
}
