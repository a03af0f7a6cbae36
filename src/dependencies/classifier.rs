// src/dependencies/classifier.rs

//! Module disposition classification
//!
//! Every resolved module is tagged MERGE (flattened into the output), EMBED
//! (kept intact as a nested archive under the private root) or EXCLUDE
//! (dropped). MERGE is the default; the disposition table only ever moves a
//! module away from it.
//!
//! Precedence is exclude > embed > include-list > default, so the result
//! depends on the table and the coordinate alone, never on module order.

use super::coordinate::{Coordinate, CoordinatePattern};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::debug;

/// What happens to a module during assembly
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Disposition {
    /// Flatten entries into the output archive
    Merge,
    /// Keep intact as a nested archive under the private root
    Embed,
    /// Drop entirely
    Exclude,
}

/// A module as handed over by the resolution stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub coordinate: Coordinate,
    /// Archive (or class directory) the module's content comes from
    pub origin: PathBuf,
    /// Platform release the module's classes were compiled for, if newer than the base
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<u32>,
}

/// A classified module. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    coordinate: Coordinate,
    origin: PathBuf,
    disposition: Disposition,
    release: Option<u32>,
    embed_path: Option<String>,
}

impl Module {
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    pub fn release(&self) -> Option<u32> {
        self.release
    }

    /// Storage path inside the output archive (EMBED modules only)
    pub fn embed_path(&self) -> Option<&str> {
        self.embed_path.as_deref()
    }
}

/// Disposition rules from configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispositionConfig {
    /// When non-empty, only matching modules (or embedded ones) are merged
    #[serde(default)]
    pub include: Vec<String>,

    /// Modules kept as nested archives
    #[serde(default)]
    pub embed: Vec<String>,

    /// Modules dropped from the output
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Compiled disposition table
#[derive(Debug, Clone, Default)]
pub struct DispositionTable {
    include: Vec<CoordinatePattern>,
    embed: Vec<CoordinatePattern>,
    exclude: Vec<CoordinatePattern>,
}

impl DispositionTable {
    pub fn from_config(config: &DispositionConfig) -> Result<Self> {
        Ok(Self {
            include: CoordinatePattern::compile_all(&config.include)?,
            embed: CoordinatePattern::compile_all(&config.embed)?,
            exclude: CoordinatePattern::compile_all(&config.exclude)?,
        })
    }

    /// Decide the disposition of a coordinate
    pub fn classify(&self, coordinate: &Coordinate) -> Disposition {
        let matches = |patterns: &[CoordinatePattern]| patterns.iter().any(|p| p.matches(coordinate));

        if matches(&self.exclude) {
            return Disposition::Exclude;
        }
        if matches(&self.embed) {
            return Disposition::Embed;
        }
        if !self.include.is_empty() && !matches(&self.include) {
            return Disposition::Exclude;
        }
        Disposition::Merge
    }
}

/// Turns module specs into classified modules
pub struct ModuleClassifier {
    table: DispositionTable,
    private_root: String,
}

impl ModuleClassifier {
    pub fn new(table: DispositionTable, private_root: impl Into<String>) -> Self {
        Self {
            table,
            private_root: private_root.into(),
        }
    }

    /// Classify a single module without touching the filesystem
    pub fn classify(&self, spec: &ModuleSpec) -> Module {
        let disposition = self.table.classify(&spec.coordinate);
        let embed_path = (disposition == Disposition::Embed)
            .then(|| spec.coordinate.storage_path(&self.private_root));

        Module {
            coordinate: spec.coordinate.clone(),
            origin: spec.origin.clone(),
            disposition,
            release: spec.release,
            embed_path,
        }
    }

    /// Classify the whole module list, checking that every kept module has an artifact
    ///
    /// The returned list keeps the input order, which is the processing order
    /// for the rest of the run.
    pub fn classify_all(&self, specs: &[ModuleSpec]) -> Result<Vec<Module>> {
        let mut seen = HashSet::new();
        let mut modules = Vec::with_capacity(specs.len());

        for spec in specs {
            if !seen.insert(&spec.coordinate) {
                return Err(Error::Config(format!(
                    "module {} is listed more than once",
                    spec.coordinate
                )));
            }

            let module = self.classify(spec);
            debug!("{} -> {}", module.coordinate, module.disposition);

            if module.disposition != Disposition::Exclude {
                if !module.origin.exists() {
                    return Err(Error::MissingModuleArtifact {
                        coordinate: module.coordinate.to_string(),
                        path: module.origin.display().to_string(),
                    });
                }
                if module.disposition == Disposition::Embed && !module.origin.is_file() {
                    return Err(Error::Config(format!(
                        "module {} is embedded but its origin {} is not an archive",
                        module.coordinate,
                        module.origin.display()
                    )));
                }
            }

            modules.push(module);
        }

        Ok(modules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(coordinate: &str, origin: &Path) -> ModuleSpec {
        ModuleSpec {
            coordinate: coordinate.parse().unwrap(),
            origin: origin.to_path_buf(),
            release: None,
        }
    }

    fn table(include: &[&str], embed: &[&str], exclude: &[&str]) -> DispositionTable {
        let to_vec = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        DispositionTable::from_config(&DispositionConfig {
            include: to_vec(include),
            embed: to_vec(embed),
            exclude: to_vec(exclude),
        })
        .unwrap()
    }

    #[test]
    fn test_default_disposition_is_merge() {
        let t = table(&[], &[], &[]);
        let c: Coordinate = "com.google.guava:guava:30.1-jre".parse().unwrap();
        assert_eq!(t.classify(&c), Disposition::Merge);
    }

    #[test]
    fn test_exclude_beats_embed() {
        let t = table(&[], &["org.checkerframework:*"], &["org.checkerframework:checker-qual"]);
        let qual: Coordinate = "org.checkerframework:checker-qual:3.8.0".parse().unwrap();
        let other: Coordinate = "org.checkerframework:checker-util:3.8.0".parse().unwrap();
        assert_eq!(t.classify(&qual), Disposition::Exclude);
        assert_eq!(t.classify(&other), Disposition::Embed);
    }

    #[test]
    fn test_include_list_excludes_unlisted_modules() {
        let t = table(&["org.ow2.asm:*", "cpw.mods:modlauncher"], &["space.vectrix:api"], &[]);
        let asm: Coordinate = "org.ow2.asm:asm:9.1".parse().unwrap();
        let api: Coordinate = "space.vectrix:api:1.0".parse().unwrap();
        let guava: Coordinate = "com.google.guava:guava:30.1".parse().unwrap();

        assert_eq!(t.classify(&asm), Disposition::Merge);
        // Embedding does not require an include entry
        assert_eq!(t.classify(&api), Disposition::Embed);
        assert_eq!(t.classify(&guava), Disposition::Exclude);
    }

    #[test]
    fn test_classification_is_order_independent() {
        let t = table(&[], &["a:*"], &["b:*"]);
        let coords: Vec<Coordinate> = ["a:x:1", "b:y:1", "c:z:1"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();

        let forward: Vec<_> = coords.iter().map(|c| t.classify(c)).collect();
        let backward: Vec<_> = coords.iter().rev().map(|c| t.classify(c)).collect();
        let backward: Vec<_> = backward.into_iter().rev().collect();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_embed_path_assigned_only_to_embedded_modules() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("x.jar");
        std::fs::write(&jar, b"PK").unwrap();

        let classifier = ModuleClassifier::new(table(&[], &["space.vectrix.ignite:*"], &[]), "META-INF/libraries");
        let embedded = classifier.classify(&spec("space.vectrix.ignite:ignite-api:0.3.0", &jar));
        let merged = classifier.classify(&spec("com.google.code.gson:gson:2.8.6", &jar));

        assert_eq!(embedded.disposition(), Disposition::Embed);
        assert_eq!(
            embedded.embed_path(),
            Some("META-INF/libraries/space/vectrix/ignite/ignite-api/0.3.0/ignite-api-0.3.0.jar")
        );
        assert_eq!(merged.embed_path(), None);
    }

    #[test]
    fn test_missing_artifact_is_reported() {
        let classifier = ModuleClassifier::new(DispositionTable::default(), "META-INF/libraries");
        let specs = vec![spec("com.example:lib:1.0", Path::new("/nonexistent/lib-1.0.jar"))];

        let err = classifier.classify_all(&specs).unwrap_err();
        match err {
            Error::MissingModuleArtifact { coordinate, path } => {
                assert_eq!(coordinate, "com.example:lib:1.0");
                assert!(path.contains("lib-1.0.jar"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_excluded_module_needs_no_artifact() {
        let classifier = ModuleClassifier::new(table(&[], &[], &["com.example:*"]), "libs");
        let specs = vec![spec("com.example:lib:1.0", Path::new("/nonexistent/lib-1.0.jar"))];

        let modules = classifier.classify_all(&specs).unwrap();
        assert_eq!(modules[0].disposition(), Disposition::Exclude);
    }

    #[test]
    fn test_duplicate_coordinates_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("x.jar");
        std::fs::write(&jar, b"PK").unwrap();

        let classifier = ModuleClassifier::new(DispositionTable::default(), "libs");
        let specs = vec![spec("a:b:1", &jar), spec("a:b:1", &jar)];
        assert!(matches!(classifier.classify_all(&specs), Err(Error::Config(_))));
    }

    #[test]
    fn test_disposition_strings() {
        assert_eq!(Disposition::Merge.to_string(), "MERGE");
        assert_eq!("embed".parse::<Disposition>().unwrap(), Disposition::Embed);
    }
}
