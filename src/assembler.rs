// src/assembler.rs

//! Assembly pipeline
//!
//! read -> classify -> relocate -> merge -> compose -> write
//!
//! MERGE modules are read and relocated on the rayon pool, one task per
//! module, with no shared mutable state. Results are collected in module
//! order and fed to the merge resolver sequentially, so the output does not
//! depend on thread scheduling. The archive is only written once the whole
//! [`OutputPlan`] is known.

use crate::archive::{read_origin, reproducible_timestamp, ArchiveEntry, WriterOptions};
use crate::config::AssemblyConfig;
use crate::dependencies::{Disposition, DispositionTable, Module, ModuleClassifier};
use crate::error::Result;
use crate::manifest::{harvest_manifest, harvest_source, is_multi_release, ManifestComposer, ReleaseTiering};
use crate::merge::{BindingTable, MergeResolver};
use crate::plan::{EmbeddedArchive, OutputPlan};
use crate::progress::{Phase, ProgressTracker, SilentProgress};
use crate::relocate::{Relocator, SymbolRelocator, TextResources};
use crate::report::{AssemblyReport, ModuleSummary};
use glob::Pattern;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// One input entry after reading, relocation and tiering
enum Loaded {
    Kept { source_path: String, entry: ArchiveEntry },
    Excluded { source_path: String, entry: ArchiveEntry, rule: String },
}

/// A MERGE module ready for the resolver
struct LoadedModule {
    entries: Vec<Loaded>,
    /// Output paths this module's entries were tiered to
    tiered: Vec<String>,
    files: usize,
}

/// Shared, read-only state for module workers
struct Transform<'a> {
    relocator: &'a SymbolRelocator,
    tiering: &'a ReleaseTiering,
    excludes: &'a [Pattern],
}

impl Transform<'_> {
    fn load(&self, module: &Module) -> Result<LoadedModule> {
        let coordinate = module.coordinate();
        let raw = read_origin(module.origin())?;
        debug!("Read {} entries from {}", raw.len(), coordinate);

        let mut loaded = LoadedModule {
            entries: Vec::with_capacity(raw.len()),
            tiered: Vec::new(),
            files: 0,
        };

        for entry in raw {
            let entry = entry.with_source(coordinate.clone());
            let source_path = entry.path.clone();
            if !entry.is_directory {
                loaded.files += 1;
            }

            if !entry.is_directory
                && let Some(pattern) = self.excludes.iter().find(|p| p.matches(&source_path))
            {
                loaded.entries.push(Loaded::Excluded {
                    source_path,
                    entry,
                    rule: format!("artifact: {}", pattern.as_str()),
                });
                continue;
            }

            let relocated = self.relocator.relocate_entry(entry)?;
            let (placed, tier) = self.tiering.place(module.release(), relocated);
            if tier.is_some() {
                loaded.tiered.push(placed.path.clone());
            }
            loaded.entries.push(Loaded::Kept {
                source_path,
                entry: placed,
            });
        }

        Ok(loaded)
    }
}

/// Drives one assembly run
pub struct Assembler {
    config: AssemblyConfig,
    progress: Arc<dyn ProgressTracker>,
}

impl Assembler {
    pub fn new(config: AssemblyConfig) -> Self {
        Self {
            config,
            progress: Arc::new(SilentProgress::new()),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Classify every configured module, in configuration order
    pub fn classify(&self) -> Result<Vec<Module>> {
        let table = DispositionTable::from_config(&self.config.dispositions)?;
        ModuleClassifier::new(table, self.config.private_root()).classify_all(&self.config.modules)
    }

    /// Run everything up to, but not including, the write
    pub fn plan(&self) -> Result<(OutputPlan, AssemblyReport)> {
        let config = &self.config;
        let modules = self.classify()?;

        let count = |d: Disposition| modules.iter().filter(|m| m.disposition() == d).count();
        info!(
            "Assembling {}: {} modules ({} merge, {} embed, {} exclude)",
            config.artifact.name.as_deref().unwrap_or("archive"),
            modules.len(),
            count(Disposition::Merge),
            count(Disposition::Embed),
            count(Disposition::Exclude)
        );

        let relocator = SymbolRelocator::new(
            Relocator::new(&config.relocations)?,
            TextResources::new(&config.artifact.text_resources)?,
        );
        let bindings = BindingTable::new(&config.merges, config.artifact.default_bindings)?;
        let excludes = config.entry_excludes()?;
        let tiering = ReleaseTiering::new(config.multi_release.clone());

        // Read and relocate
        let merging: Vec<&Module> = modules
            .iter()
            .filter(|m| m.disposition() == Disposition::Merge)
            .collect();
        self.progress.start_phase(Phase::Read, merging.len() as u64);

        let transform = Transform {
            relocator: &relocator,
            tiering: &tiering,
            excludes: &excludes,
        };
        let progress = &self.progress;
        let results: Vec<Result<LoadedModule>> = merging
            .par_iter()
            .map(|module| {
                let loaded = transform.load(module);
                progress.increment(1);
                loaded
            })
            .collect();
        let loaded = results.into_iter().collect::<Result<Vec<_>>>()?;
        self.progress.finish_phase(Phase::Read);

        // Merge, in module order
        let total: usize = loaded.iter().map(|l| l.entries.len()).sum();
        self.progress.start_phase(Phase::Merge, total as u64);

        let mut resolver = MergeResolver::new(&bindings);
        let mut tiered = BTreeSet::new();
        let mut summaries = Vec::with_capacity(modules.len());
        let mut loaded = loaded.into_iter();

        for module in &modules {
            let mut summary = ModuleSummary {
                coordinate: module.coordinate().to_string(),
                disposition: module.disposition(),
                origin: module.origin().to_path_buf(),
                embed_path: module.embed_path().map(str::to_string),
                entries: 0,
            };

            if module.disposition() == Disposition::Merge
                && let Some(batch) = loaded.next()
            {
                summary.entries = batch.files;
                tiered.extend(batch.tiered);
                for item in batch.entries {
                    match item {
                        Loaded::Kept { source_path, entry } => resolver.offer(&source_path, entry)?,
                        Loaded::Excluded {
                            source_path,
                            entry,
                            rule,
                        } => resolver.record_excluded(&source_path, &entry, rule),
                    }
                    self.progress.increment(1);
                }
            }
            summaries.push(summary);
        }

        let resolved = resolver.finish()?;
        self.progress.finish_phase(Phase::Merge);

        // Compose
        tiering.check_fallbacks(&tiered, &resolved.entries)?;
        let multi_release = is_multi_release(resolved.entries.iter().map(|e| e.path.as_str()));

        let mut composer = ManifestComposer::new(&config.manifest, relocator.rules())
            .with_multi_release(multi_release);
        if let Some(pattern) = &config.manifest.harvest_from {
            let source = harvest_source(pattern, &modules)?;
            composer = composer.with_harvest(harvest_manifest(source)?);
        }
        let manifest = composer.compose();

        let embeds: Vec<EmbeddedArchive> = modules.iter().filter_map(EmbeddedArchive::from_module).collect();
        let plan = OutputPlan::new(manifest, resolved.entries, resolved.directories, embeds)?;

        let mut report = AssemblyReport::new();
        report.modules = summaries;
        report.entries = resolved.records;
        report.output_entries = plan.file_count();
        report.multi_release = multi_release;

        info!(
            "Planned {} files ({} merged entries, {} embedded)",
            plan.file_count(),
            plan.entries().len(),
            plan.embeds().len()
        );
        Ok((plan, report))
    }

    /// Assemble the archive at `dest`
    ///
    /// On failure nothing is left at `dest`.
    pub fn assemble(&self, dest: &Path) -> Result<AssemblyReport> {
        let result = self.run(dest);
        if let Err(e) = &result {
            self.progress.finish_with_error(&e.to_string());
        }
        result
    }

    fn run(&self, dest: &Path) -> Result<AssemblyReport> {
        let (plan, mut report) = self.plan()?;

        let options = WriterOptions {
            timestamp: reproducible_timestamp(),
            normalize_timestamps: self.config.artifact.normalize_timestamps,
        };
        let written = plan.write(dest, options, self.progress.as_ref())?;

        report.output_entries = written.entry_count;
        report.output = Some(written.path);
        report.size = Some(written.size);
        report.sha256 = Some(written.sha256);
        Ok(report)
    }
}
