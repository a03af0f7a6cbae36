// src/dependencies/coordinate.rs

//! Module coordinates and coordinate patterns
//!
//! A coordinate identifies a resolved module as `group:name:version` with an
//! optional fourth `classifier` segment (`cpw.mods:modlauncher:8.0.9:api`).
//! Patterns use the same shape with glob segments; trailing segments that are
//! left out match anything, so `org.ow2.asm:*` selects every ASM artifact.

use crate::error::{Error, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A resolved module coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinate {
    pub group: String,
    pub name: String,
    pub version: String,
    pub classifier: Option<String>,
}

impl Coordinate {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Archive file name: `<name>-<version>[-<classifier>].jar`
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!("{}-{}-{}.jar", self.name, self.version, classifier),
            None => format!("{}-{}.jar", self.name, self.version),
        }
    }

    /// Storage path of this module under a private embed root
    ///
    /// `<root>/<group with dots as slashes>/<name>/<version>/<file name>`.
    /// Distinct coordinates never share a path and the same coordinate
    /// always maps to the same path.
    pub fn storage_path(&self, root: &str) -> String {
        let root = root.trim_matches('/');
        let group = self.group.replace('.', "/");
        let mut path = String::new();
        if !root.is_empty() {
            path.push_str(root);
            path.push('/');
        }
        path.push_str(&format!(
            "{}/{}/{}/{}",
            group,
            self.name,
            self.version,
            self.file_name()
        ));
        path
    }

    /// Segment values used for pattern matching (classifier is empty when absent)
    fn segments(&self) -> [&str; 4] {
        [
            &self.group,
            &self.name,
            &self.version,
            self.classifier.as_deref().unwrap_or(""),
        ]
    }
}

impl FromStr for Coordinate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if !(3..=4).contains(&parts.len()) || parts.iter().any(|p| p.is_empty() || p.contains('/')) {
            return Err(Error::InvalidCoordinate(s.to_string()));
        }

        let mut coordinate = Coordinate::new(parts[0], parts[1], parts[2]);
        if let Some(classifier) = parts.get(3) {
            coordinate.classifier = Some(classifier.to_string());
        }
        Ok(coordinate)
    }
}

impl TryFrom<String> for Coordinate {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Coordinate> for String {
    fn from(value: Coordinate) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        Ok(())
    }
}

/// A glob pattern over coordinates
#[derive(Debug, Clone)]
pub struct CoordinatePattern {
    source: String,
    segments: Vec<Pattern>,
}

impl CoordinatePattern {
    /// Compile a pattern such as `org.apache.logging.log4j:log4j-*`
    pub fn new(pattern: &str) -> Result<Self> {
        let parts: Vec<&str> = pattern.trim().split(':').collect();
        if parts.is_empty() || parts.len() > 4 || parts.iter().any(|p| p.is_empty()) {
            return Err(Error::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "expected 1 to 4 non-empty ':'-separated segments".to_string(),
            });
        }

        let segments = parts
            .iter()
            .map(|part| {
                Pattern::new(part).map_err(|e| Error::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            source: pattern.trim().to_string(),
            segments,
        })
    }

    /// Compile a list of patterns
    pub fn compile_all(patterns: &[String]) -> Result<Vec<Self>> {
        patterns.iter().map(|p| Self::new(p)).collect()
    }

    pub fn matches(&self, coordinate: &Coordinate) -> bool {
        self.segments
            .iter()
            .zip(coordinate.segments())
            .all(|(pattern, value)| pattern.matches(value))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for CoordinatePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
