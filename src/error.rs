// src/error.rs

//! Error types for archive assembly
//!
//! Every variant carries the coordinate, path, or rule involved so a failed
//! run can be diagnosed from the message alone.

use thiserror::Error;

/// Errors that abort an assembly run
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input archive (bad central directory, local header mismatch, bad CRC)
    #[error("Corrupt archive {path}: {reason}")]
    CorruptArchive { path: String, reason: String },

    /// Two modules contributed different content for a path with no merge strategy
    #[error("Unresolved merge conflict at '{path}': contributed by {first} and {second}")]
    UnresolvedMergeConflict {
        path: String,
        first: String,
        second: String,
    },

    /// Two relocation rules match with equal-length prefixes
    #[error("Relocation ambiguity for prefix '{prefix}': rules {first} and {second} both apply")]
    RelocationAmbiguity {
        prefix: String,
        first: String,
        second: String,
    },

    /// A listed module has no origin archive on disk
    #[error("Missing artifact for module {coordinate}: {path} does not exist")]
    MissingModuleArtifact { coordinate: String, path: String },

    /// The same path was handed to the archive writer twice
    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),

    /// A class file could not be parsed for relocation
    #[error("Malformed class file {path} in {module}: {reason}")]
    MalformedClass {
        path: String,
        module: String,
        reason: String,
    },

    /// A structured resource (plugin cache, manifest) could not be parsed
    #[error("Malformed resource {path} in {module}: {reason}")]
    MalformedResource {
        path: String,
        module: String,
        reason: String,
    },

    /// A version-tiered class has no base-tier counterpart
    #[error("Versioned class {path} (release {release}) has no fallback at the unversioned path")]
    MissingReleaseFallback { path: String, release: u32 },

    #[error("Invalid coordinate '{0}': expected group:name:version[:classifier]")]
    InvalidCoordinate(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit status for this error kind
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::UnresolvedMergeConflict { .. } => 2,
            Self::CorruptArchive { .. }
            | Self::MalformedClass { .. }
            | Self::MalformedResource { .. } => 3,
            Self::RelocationAmbiguity { .. } => 4,
            Self::MissingModuleArtifact { .. } => 5,
            Self::InvalidCoordinate(_)
            | Self::InvalidPattern { .. }
            | Self::Config(_)
            | Self::ConfigParse(_) => 6,
            Self::MissingReleaseFallback { .. } => 7,
            Self::DuplicateEntry(_) | Self::Io(_) => 1,
        }
    }

    pub(crate) fn corrupt(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::CorruptArchive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for assembly operations
pub type Result<T> = std::result::Result<T, Error>;
