// src/dependencies/mod.rs

//! Resolved module model
//!
//! The resolution stage hands over a fixed list of modules, each with a
//! coordinate and an origin archive. This module turns that list into
//! classified [`Module`]s:
//!
//! ```ignore
//! use jarforge::dependencies::{DispositionTable, ModuleClassifier};
//!
//! let classifier = ModuleClassifier::new(table, "META-INF/libraries");
//! let modules = classifier.classify_all(&config.modules)?;
//! ```

mod classifier;
mod coordinate;

pub use classifier::{
    Disposition, DispositionConfig, DispositionTable, Module, ModuleClassifier, ModuleSpec,
};
pub use coordinate::{Coordinate, CoordinatePattern};
