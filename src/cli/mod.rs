// src/cli/mod.rs
//! CLI definitions for jarforge
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! - `assemble` - Build the output archive from a configuration
//! - `plan` - Run everything except the write and print the result
//! - `inspect` - Show the manifest and entries of an existing archive
//! - `init` - Write a starter `jarforge.toml`

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use jarforge::config::CONFIG_FILE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jarforge")]
#[command(author = "Jarforge Contributors")]
#[command(version)]
#[command(about = "Assemble a single conflict-free Java archive from resolved modules", long_about = None)]
pub struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter used when RUST_LOG is not set
    pub fn default_log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble the output archive
    Assemble {
        /// Assembly configuration
        #[arg(default_value = CONFIG_FILE)]
        config: PathBuf,

        /// Output archive (overrides artifact.output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the assembly report as JSON
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Classify, relocate and merge without writing, then show the result
    Plan {
        /// Assembly configuration
        #[arg(default_value = CONFIG_FILE)]
        config: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the contents of an archive
    Inspect {
        /// Archive to inspect
        jar: PathBuf,

        /// Print the manifest
        #[arg(long)]
        manifest: bool,

        /// List every entry
        #[arg(long)]
        entries: bool,
    },

    /// Write a starter jarforge.toml
    Init {
        /// Project directory
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Artifact name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
