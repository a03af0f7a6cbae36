// src/lib.rs

//! jarforge: single-archive assembly for JVM applications
//!
//! Takes a resolved module list and produces one distributable archive:
//!
//! - Modules are classified MERGE, EMBED or EXCLUDE by coordinate globs
//! - MERGE modules have third-party packages relocated under a private
//!   prefix, in class files and text resources alike
//! - Paths contributed by several modules go through an explicit merge
//!   strategy; an unbound duplicate is a hard error, never silent loss
//! - EMBED modules are stored intact under a private root for a bootstrap
//!   loader to mount
//! - The manifest is composed fresh, and classes for newer platform
//!   releases are tiered under `META-INF/versions/<N>/`
//!
//! Output is byte-reproducible: modules are processed in configuration
//! order and timestamps are normalized.

pub mod archive;
pub mod assembler;
pub mod config;
pub mod dependencies;
mod error;
pub mod hash;
pub mod manifest;
pub mod merge;
pub mod mutf8;
pub mod plan;
pub mod progress;
pub mod relocate;
pub mod report;

pub use assembler::Assembler;
pub use config::AssemblyConfig;
pub use dependencies::{Coordinate, Disposition, Module, ModuleSpec};
pub use error::{Error, Result};
pub use merge::MergeStrategy;
pub use plan::OutputPlan;
pub use progress::{LogProgress, Phase, ProgressTracker, SilentProgress};
pub use relocate::RelocationRule;
pub use report::{AssemblyReport, EntryFate, EntryRecord};
