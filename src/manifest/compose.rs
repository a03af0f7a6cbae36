// src/manifest/compose.rs

//! Manifest composition
//!
//! The output manifest is built from three layers, strongest first:
//! the configured attribute map, the derived entry-point and
//! specification/implementation triples, and a fragment harvested from one
//! designated dependency. Harvested attributes only fill gaps.

use super::model::{Manifest, ManifestError, MANIFEST_VERSION};
use crate::archive::{ArchiveReader, MANIFEST_PATH};
use crate::dependencies::{CoordinatePattern, Module};
use crate::error::{Error, Result};
use crate::relocate::Relocator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const CREATED_BY: &str = "Created-By";
pub const MULTI_RELEASE: &str = "Multi-Release";

/// Attributes whose values name a class and follow relocation
const ENTRY_POINTS: &[&str] = &[
    "Main-Class",
    "Premain-Class",
    "Agent-Class",
    "Launcher-Agent-Class",
];

/// Main attributes never taken from a harvested manifest
const NOT_HARVESTED: &[&str] = &[
    MANIFEST_VERSION,
    CREATED_BY,
    MULTI_RELEASE,
    "Main-Class",
    "Premain-Class",
    "Agent-Class",
    "Launcher-Agent-Class",
    "Automatic-Module-Name",
    "Class-Path",
];

/// The `[manifest]` table of the assembly configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Project version; drives the specification and implementation versions
    pub version: Option<String>,
    pub title: Option<String>,
    pub vendor: Option<String>,
    pub main_class: Option<String>,
    pub premain_class: Option<String>,
    pub agent_class: Option<String>,
    pub launcher_agent_class: Option<String>,
    pub automatic_module_name: Option<String>,
    /// Coordinate glob selecting the module whose manifest is harvested
    pub harvest_from: Option<String>,
    /// Extra main attributes; these override everything else
    pub attributes: BTreeMap<String, String>,
    /// Named sections, keyed by section name
    pub sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ManifestConfig {
    fn entry_points(&self) -> [(&'static str, Option<&String>); 4] {
        [
            ("Main-Class", self.main_class.as_ref()),
            ("Premain-Class", self.premain_class.as_ref()),
            ("Agent-Class", self.agent_class.as_ref()),
            ("Launcher-Agent-Class", self.launcher_agent_class.as_ref()),
        ]
    }
}

/// Derive a specification version: `major.minor`, or `<major>.0`
///
/// Returns `None` when the version does not start with a number.
pub fn specification_version(version: &str) -> Option<String> {
    if let Ok(parsed) = semver::Version::parse(version) {
        return Some(format!("{}.{}", parsed.major, parsed.minor));
    }

    // Not strict semver ("1.2", "3-SNAPSHOT", "2.1.RELEASE"): read leading numbers
    let mut parts = version
        .split(['.', '-', '+'])
        .map_while(|p| (!p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())).then_some(p));
    let major = parts.next()?.parse::<u64>().ok()?;
    let minor = parts.next().and_then(|m| m.parse::<u64>().ok()).unwrap_or(0);
    Some(format!("{}.{}", major, minor))
}

/// Composes the output manifest
pub struct ManifestComposer<'a> {
    config: &'a ManifestConfig,
    relocator: &'a Relocator,
    harvested: Option<Manifest>,
    multi_release: bool,
}

impl<'a> ManifestComposer<'a> {
    pub fn new(config: &'a ManifestConfig, relocator: &'a Relocator) -> Self {
        Self {
            config,
            relocator,
            harvested: None,
            multi_release: false,
        }
    }

    pub fn with_harvest(mut self, manifest: Manifest) -> Self {
        self.harvested = Some(manifest);
        self
    }

    pub fn with_multi_release(mut self, multi_release: bool) -> Self {
        self.multi_release = multi_release;
        self
    }

    pub fn compose(&self) -> Manifest {
        let config = self.config;
        let mut manifest = Manifest::new();
        let main = &mut manifest.main;

        main.insert(MANIFEST_VERSION, "1.0");
        main.insert(CREATED_BY, format!("jarforge {}", env!("CARGO_PKG_VERSION")));

        for (name, class) in config.entry_points() {
            if let Some(class) = class {
                main.insert(name, self.relocator.relocate_type_name(class));
            }
        }
        if let Some(name) = &config.automatic_module_name {
            main.insert("Automatic-Module-Name", name.as_str());
        }
        if self.multi_release {
            main.insert(MULTI_RELEASE, "true");
        }

        if let Some(title) = &config.title {
            main.insert("Specification-Title", title.as_str());
        }
        if let Some(spec) = config.version.as_deref().and_then(specification_version) {
            main.insert("Specification-Version", spec);
        }
        if let Some(vendor) = &config.vendor {
            main.insert("Specification-Vendor", vendor.as_str());
        }
        if let Some(title) = &config.title {
            main.insert("Implementation-Title", title.as_str());
        }
        if let Some(version) = &config.version {
            main.insert("Implementation-Version", version.as_str());
        }
        if let Some(vendor) = &config.vendor {
            main.insert("Implementation-Vendor", vendor.as_str());
        }

        for (name, value) in &config.attributes {
            let value = if ENTRY_POINTS.iter().any(|e| e.eq_ignore_ascii_case(name)) {
                self.relocator.relocate_type_name(value).into_owned()
            } else {
                value.clone()
            };
            main.insert(name.as_str(), value);
        }
        if self.multi_release {
            main.insert(MULTI_RELEASE, "true");
        }

        if let Some(harvested) = &self.harvested {
            for (name, value) in harvested.main.iter() {
                if NOT_HARVESTED.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                    continue;
                }
                if manifest.main.insert_if_absent(name, value) {
                    debug!("Harvested manifest attribute {}", name);
                }
            }
            for (name, attrs) in harvested.sections() {
                let name = self.relocator.relocate_path(name);
                let section = manifest.section_mut(&name);
                for (key, value) in attrs.iter() {
                    section.insert(key, value);
                }
            }
        }

        // Configured sections override harvested ones attribute by attribute
        for (name, attrs) in &config.sections {
            let name = self.relocator.relocate_path(name);
            let section = manifest.section_mut(&name);
            for (key, value) in attrs {
                section.insert(key.as_str(), value.as_str());
            }
        }

        manifest
    }
}

/// Pick the module named by `harvest_from`, the first match in module order
pub fn harvest_source<'m>(pattern: &str, modules: &'m [Module]) -> Result<&'m Module> {
    let pattern = CoordinatePattern::new(pattern)?;
    modules
        .iter()
        .find(|m| pattern.matches(m.coordinate()))
        .ok_or_else(|| {
            Error::Config(format!(
                "manifest.harvest_from '{}' matches no module",
                pattern.as_str()
            ))
        })
}

/// Read and parse the manifest of a module's origin
pub fn harvest_manifest(module: &Module) -> Result<Manifest> {
    let origin = module.origin();
    let coordinate = module.coordinate().to_string();

    let bytes = if origin.is_dir() {
        let path = origin.join(MANIFEST_PATH);
        path.is_file().then(|| std::fs::read(&path)).transpose()?
    } else if origin.is_file() {
        ArchiveReader::open(origin)?
            .read_entry(MANIFEST_PATH)?
            .map(|entry| entry.bytes)
    } else {
        return Err(Error::MissingModuleArtifact {
            coordinate,
            path: origin.display().to_string(),
        });
    };

    let bytes = bytes.ok_or_else(|| {
        Error::Config(format!(
            "cannot harvest manifest: {} has no {}",
            coordinate, MANIFEST_PATH
        ))
    })?;

    let manifest = parse_manifest(&bytes, &coordinate)?;
    info!(
        "Harvested manifest from {} ({} attributes, {} sections)",
        coordinate,
        manifest.main.len(),
        manifest.sections().count()
    );
    Ok(manifest)
}

fn parse_manifest(bytes: &[u8], module: &str) -> Result<Manifest> {
    Manifest::parse(bytes).map_err(|e: ManifestError| Error::MalformedResource {
        path: MANIFEST_PATH.to_string(),
        module: module.to_string(),
        reason: e.to_string(),
    })
}
