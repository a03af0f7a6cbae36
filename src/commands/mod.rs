// src/commands/mod.rs
//! Command handlers for the jarforge CLI

mod assemble;
mod init;
mod inspect;
mod plan;
pub mod progress;

pub use assemble::cmd_assemble;
pub use init::cmd_init;
pub use inspect::cmd_inspect;
pub use plan::cmd_plan;

use anyhow::{Context, Result};
use jarforge::config::AssemblyConfig;
use std::path::Path;

/// Load and validate an assembly configuration
fn load_config(path: &Path) -> Result<AssemblyConfig> {
    AssemblyConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration {}", path.display()))
}
