// src/archive/mod.rs

//! Zip-format archive reading and writing
//!
//! Module origins are read through [`ArchiveReader`] (or [`read_directory`]
//! for exploded class directories); the output is produced by
//! [`ArchiveWriter`], which refuses duplicate paths and only makes the
//! archive visible once it is complete.

mod entry;
mod reader;
mod writer;

pub use entry::{
    is_safe_entry_name, parent_directories, split_versioned, versioned_path, ArchiveEntry,
    MANIFEST_PATH, VERSIONS_PREFIX,
};
pub use reader::{read_directory, read_origin, ArchiveReader, Entries};
pub use writer::{
    compression_for, reproducible_timestamp, timestamp_from_epoch, ArchiveWriter, WriterOptions,
    WrittenArchive, DEFAULT_EPOCH,
};
