// src/commands/plan.rs

//! `jarforge plan`

use super::load_config;
use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use jarforge::Assembler;
use std::path::Path;

/// Show what an assembly would produce without writing it
pub fn cmd_plan(config_path: &Path, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let (plan, report) = Assembler::new(config)
        .plan()
        .context("Failed to plan assembly")?;

    match format {
        OutputFormat::Json => {
            println!("{}", report.to_json().context("Failed to serialize plan")?);
        }
        OutputFormat::Text => {
            report.print_summary();
            if !plan.embeds().is_empty() {
                println!();
                println!("Embedded archives:");
                for embed in plan.embeds() {
                    println!("  {} -> {}", embed.coordinate, embed.path);
                }
            }
            println!();
            println!("Manifest:");
            for line in plan.manifest().to_string().lines().filter(|l| !l.is_empty()) {
                println!("  {}", line);
            }
        }
    }

    Ok(())
}
