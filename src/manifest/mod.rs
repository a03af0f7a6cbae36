// src/manifest/mod.rs

//! Manifest and multi-release composition
//!
//! Input manifests never reach the output directly. The composer builds a
//! fresh `META-INF/MANIFEST.MF` from configuration, the output's
//! multi-release state, and at most one manifest harvested from a
//! dependency.

mod compose;
mod model;
mod release;

pub use compose::{
    harvest_manifest, harvest_source, specification_version, ManifestComposer, ManifestConfig,
    CREATED_BY, MULTI_RELEASE,
};
pub use model::{Attributes, Manifest, ManifestError, LINE_LIMIT, MANIFEST_VERSION};
pub use release::{is_multi_release, MultiReleaseConfig, ReleaseTiering};
