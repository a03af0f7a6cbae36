// src/commands/assemble.rs

//! `jarforge assemble`

use super::load_config;
use super::progress::CliProgress;
use anyhow::{Context, Result};
use jarforge::progress::{LogProgress, ProgressTracker};
use jarforge::Assembler;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Assemble the archive described by a configuration file
pub fn cmd_assemble(
    config_path: &Path,
    output: Option<&Path>,
    report_path: Option<&Path>,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let dest = config.output_path(output)?;

    let progress: Arc<dyn ProgressTracker> = if show_progress && !quiet && std::io::stderr().is_terminal() {
        Arc::new(CliProgress::new())
    } else {
        Arc::new(LogProgress::new("assemble"))
    };

    info!("Assembling {} from {}", dest.display(), config_path.display());
    let report = Assembler::new(config)
        .with_progress(progress)
        .assemble(&dest)
        .with_context(|| format!("Failed to assemble {}", dest.display()))?;

    if let Some(path) = report_path {
        let json = report.to_json().context("Failed to serialize assembly report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    if !quiet {
        report.print_summary();
    }
    Ok(())
}
