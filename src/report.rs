// src/report.rs

//! Assembly accounting
//!
//! Every file entry read from a MERGE module gets exactly one [`EntryFate`],
//! so a reader of the report can tell where each input went: written
//! (possibly under a new path), merged into combined content, dropped in
//! favor of an earlier contribution, collapsed into an identical copy, or
//! excluded by a named rule.

use crate::dependencies::Disposition;
use crate::merge::MergeStrategy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// What happened to one input entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "fate", rename_all = "kebab-case")]
pub enum EntryFate {
    /// Written to the output as the sole or first contribution
    Written,
    /// Combined with other contributions
    Merged { strategy: MergeStrategy },
    /// Lost to an earlier contribution under first-wins
    Dropped { kept_from: String },
    /// Byte-identical to an earlier contribution with no binding
    Collapsed { kept_from: String },
    /// Removed by an exclusion rule
    Excluded { rule: String },
}

impl EntryFate {
    /// Short label used in summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::Merged { .. } => "merged",
            Self::Dropped { .. } => "dropped",
            Self::Collapsed { .. } => "collapsed",
            Self::Excluded { .. } => "excluded",
        }
    }
}

impl fmt::Display for EntryFate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written => write!(f, "written"),
            Self::Merged { strategy } => write!(f, "merged ({})", strategy),
            Self::Dropped { kept_from } => write!(f, "dropped (kept from {})", kept_from),
            Self::Collapsed { kept_from } => write!(f, "collapsed (identical to {})", kept_from),
            Self::Excluded { rule } => write!(f, "excluded ({})", rule),
        }
    }
}

/// Ledger line for one input entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryRecord {
    pub module: String,
    /// Path inside the module's origin
    pub source_path: String,
    /// Path in the output after relocation and tiering
    pub final_path: String,
    #[serde(flatten)]
    pub fate: EntryFate,
}

impl EntryRecord {
    pub fn renamed(&self) -> bool {
        self.source_path != self.final_path
    }
}

/// Per-module summary
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    pub coordinate: String,
    pub disposition: Disposition,
    pub origin: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_path: Option<String>,
    /// File entries read (MERGE modules only)
    pub entries: usize,
}

/// Everything a run did, ready for printing or JSON output
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssemblyReport {
    pub modules: Vec<ModuleSummary>,
    pub entries: Vec<EntryRecord>,
    /// Output entry count (files and directories)
    pub output_entries: usize,
    pub multi_release: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl AssemblyReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: EntryRecord) {
        self.entries.push(record);
    }

    /// Count of input entries per fate label
    pub fn fate_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.entries {
            *counts.entry(record.fate.label()).or_insert(0) += 1;
        }
        counts
    }

    /// Input entries whose path changed on the way to the output
    pub fn renamed_count(&self) -> usize {
        self.entries.iter().filter(|r| r.renamed()).count()
    }

    /// Records for one module
    pub fn entries_for<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a EntryRecord> + 'a {
        self.entries.iter().filter(move |r| r.module == module)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Print a human-readable summary
    pub fn print_summary(&self) {
        println!("Modules:");
        for module in &self.modules {
            match &module.embed_path {
                Some(path) => println!("  {:<8} {} -> {}", module.disposition, module.coordinate, path),
                None if module.disposition == Disposition::Merge => {
                    println!("  {:<8} {} ({} entries)", module.disposition, module.coordinate, module.entries)
                }
                None => println!("  {:<8} {}", module.disposition, module.coordinate),
            }
        }

        println!();
        println!("Entries:");
        for (label, count) in self.fate_counts() {
            println!("  {:<10} {}", label, count);
        }
        println!("  {:<10} {}", "renamed", self.renamed_count());

        println!();
        println!("Output entries: {}", self.output_entries);
        if self.multi_release {
            println!("Multi-Release: true");
        }
        if let Some(output) = &self.output {
            println!("Output: {}", output.display());
        }
        if let Some(size) = self.size {
            println!("Size: {} bytes", size);
        }
        if let Some(sha256) = &self.sha256 {
            println!("SHA-256: {}", sha256);
        }
    }
}
