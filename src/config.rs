// src/config.rs

//! Assembly configuration (`jarforge.toml`)
//!
//! One configuration describes one output archive: the resolved module
//! list, how each module is treated, the relocation rules, merge bindings
//! and manifest attributes. It is parsed once and handed to the assembler
//! by reference; nothing in the core keeps configuration in global state.

use crate::dependencies::{Coordinate, CoordinatePattern, DispositionConfig, DispositionTable, ModuleSpec};
use crate::error::{Error, Result};
use crate::manifest::{ManifestConfig, MultiReleaseConfig};
use crate::merge::{BindingTable, MergeRule};
use crate::relocate::{RelocationRule, Relocator, TextResources, DEFAULT_TEXT_RESOURCES};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default file name looked up by the command line
pub const CONFIG_FILE: &str = "jarforge.toml";

/// Where embedded modules live inside the output by default
pub const DEFAULT_PRIVATE_ROOT: &str = "META-INF/libraries";

/// The `[artifact]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Informational name, used in logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Output archive; the command line can override it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// Directory inside the output holding embedded modules
    pub private_root: String,
    /// Stamp every entry with the reproducible build time
    pub normalize_timestamps: bool,
    /// Install the built-in merge bindings after user bindings
    pub default_bindings: bool,
    /// Entry path globs dropped from every MERGE module before relocation
    pub exclude: Vec<String>,
    /// Entry path globs whose type-name lines are relocated
    pub text_resources: Vec<String>,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            name: None,
            output: None,
            private_root: DEFAULT_PRIVATE_ROOT.to_string(),
            normalize_timestamps: true,
            default_bindings: true,
            exclude: Vec::new(),
            text_resources: DEFAULT_TEXT_RESOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A complete assembly configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyConfig {
    #[serde(default)]
    pub artifact: ArtifactConfig,

    /// Resolved modules, in processing order
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleSpec>,

    #[serde(default)]
    pub dispositions: DispositionConfig,

    #[serde(default, rename = "relocation")]
    pub relocations: Vec<RelocationRule>,

    #[serde(default, rename = "merge")]
    pub merges: Vec<MergeRule>,

    #[serde(default)]
    pub manifest: ManifestConfig,

    #[serde(default)]
    pub multi_release: MultiReleaseConfig,
}

impl AssemblyConfig {
    /// Load a configuration file
    ///
    /// Relative module origins and the output path are resolved against the
    /// directory holding the file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: AssemblyConfig = toml::from_str(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string; paths are left as written
    pub fn parse(content: &str) -> Result<Self> {
        let config: AssemblyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Make relative paths relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        for module in &mut self.modules {
            if module.origin.is_relative() {
                module.origin = base.join(&module.origin);
            }
        }
        if let Some(output) = &self.artifact.output
            && output.is_relative()
        {
            self.artifact.output = Some(base.join(output));
        }
    }

    /// Check consistency without touching the filesystem
    pub fn validate(&self) -> Result<()> {
        let root = &self.artifact.private_root;
        if root.is_empty()
            || root.starts_with('/')
            || root.split('/').any(|segment| segment == "..")
        {
            return Err(Error::Config(format!(
                "artifact.private_root '{}' must be a relative path inside the archive",
                root
            )));
        }

        for pattern in &self.artifact.exclude {
            compile_glob(pattern)?;
        }
        TextResources::new(&self.artifact.text_resources)?;
        DispositionTable::from_config(&self.dispositions)?;
        Relocator::new(&self.relocations)?;
        BindingTable::new(&self.merges, self.artifact.default_bindings)?;

        if let Some(pattern) = &self.manifest.harvest_from {
            CoordinatePattern::new(pattern)?;
        }
        if self.multi_release.base_release == Some(0) {
            return Err(Error::Config("multi_release.base_release must be at least 1".to_string()));
        }
        for module in &self.modules {
            if module.release == Some(0) {
                return Err(Error::Config(format!(
                    "module {}: release must be at least 1",
                    module.coordinate
                )));
            }
        }

        Ok(())
    }

    /// Private root without a trailing slash
    pub fn private_root(&self) -> &str {
        self.artifact.private_root.trim_end_matches('/')
    }

    /// Output path: the override if given, else `artifact.output`
    pub fn output_path(&self, override_path: Option<&Path>) -> Result<PathBuf> {
        override_path
            .map(Path::to_path_buf)
            .or_else(|| self.artifact.output.clone())
            .ok_or_else(|| {
                Error::Config("no output path: set artifact.output or pass --output".to_string())
            })
    }

    /// Compiled `artifact.exclude` globs
    pub fn entry_excludes(&self) -> Result<Vec<Pattern>> {
        self.artifact.exclude.iter().map(|p| compile_glob(p)).collect()
    }

    /// A small starting configuration for a new project
    pub fn new_minimal(name: &str) -> Self {
        let mut config = Self::default();
        config.artifact.name = Some(name.to_string());
        config.artifact.output = Some(PathBuf::from(format!("build/libs/{}.jar", name)));
        config.modules.push(ModuleSpec {
            coordinate: Coordinate::new("com.example", name, "0.1.0"),
            origin: PathBuf::from(format!("build/libs/{}-base.jar", name)),
            release: None,
        });
        config.relocations.push(RelocationRule::new(
            "com.google.gson",
            format!("com.example.{}.libs.gson", name.replace('-', "_")),
        ));
        config.manifest.version = Some("0.1.0".to_string());
        config.manifest.title = Some(name.to_string());
        config
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

fn compile_glob(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
