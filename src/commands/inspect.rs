// src/commands/inspect.rs

//! `jarforge inspect`

use anyhow::{Context, Result};
use jarforge::archive::{split_versioned, ArchiveReader, MANIFEST_PATH};
use jarforge::manifest::Manifest;
use std::collections::BTreeMap;
use std::path::Path;

/// Print a summary of an archive, optionally with its manifest and entry list
pub fn cmd_inspect(jar: &Path, show_manifest: bool, show_entries: bool) -> Result<()> {
    let mut reader = ArchiveReader::open(jar)
        .with_context(|| format!("Failed to open {}", jar.display()))?;
    let entries = reader.read_all()?;

    let manifest = match entries.iter().find(|e| e.path == MANIFEST_PATH) {
        Some(entry) => Some(Manifest::parse(&entry.bytes).context("Failed to parse manifest")?),
        None => None,
    };

    let files: Vec<_> = entries.iter().filter(|e| !e.is_directory).collect();
    let classes = files.iter().filter(|e| e.is_class()).count();
    let nested: Vec<_> = files.iter().filter(|e| e.path.ends_with(".jar")).collect();

    let mut tiers: BTreeMap<u32, usize> = BTreeMap::new();
    for entry in &files {
        if let Some((release, _)) = split_versioned(&entry.path) {
            *tiers.entry(release).or_insert(0) += 1;
        }
    }

    println!("Archive: {}", jar.display());
    println!("Entries: {} ({} files, {} classes)", entries.len(), files.len(), classes);
    if let Some(manifest) = &manifest {
        for name in ["Main-Class", "Implementation-Version", "Multi-Release"] {
            if let Some(value) = manifest.main.get(name) {
                println!("{}: {}", name, value);
            }
        }
    } else {
        println!("No manifest");
    }
    for (release, count) in &tiers {
        println!("Release {}: {} entries", release, count);
    }
    if !nested.is_empty() {
        println!("Nested archives:");
        for entry in &nested {
            println!("  {} ({} bytes)", entry.path, entry.bytes.len());
        }
    }

    if show_manifest && let Some(manifest) = &manifest {
        println!();
        print!("{}", manifest);
    }

    if show_entries {
        println!();
        for entry in &entries {
            if entry.is_directory {
                println!("{:>10}  {}", "-", entry.path);
            } else {
                println!("{:>10}  {}", entry.bytes.len(), entry.path);
            }
        }
    }

    Ok(())
}
