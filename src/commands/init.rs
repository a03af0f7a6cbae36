// src/commands/init.rs

//! `jarforge init`

use anyhow::{bail, Context, Result};
use jarforge::config::{AssemblyConfig, CONFIG_FILE};
use std::path::Path;

/// Write a starter configuration into `dir`
pub fn cmd_init(dir: &Path, name: Option<&str>, force: bool) -> Result<()> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let name = match name {
        Some(name) => name.to_string(),
        None => dir
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "app".to_string()),
    };

    let config = AssemblyConfig::new_minimal(&name);
    let content = config.to_toml()?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created {}", path.display());
    println!("\nEdit the module list, then run 'jarforge assemble'.");
    Ok(())
}
