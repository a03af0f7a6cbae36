// src/manifest/model.rs

//! JAR manifest model and wire format
//!
//! A manifest is a main section followed by named sections. Attribute names
//! are case-insensitive and keep their insertion order. On the wire every
//! line is at most 72 bytes; longer values continue on lines that start
//! with a single space. Lines end in CRLF and sections are separated by a
//! blank line.

use std::fmt;
use thiserror::Error;

/// Maximum bytes per manifest line, excluding the line terminator
pub const LINE_LIMIT: usize = 72;

pub const MANIFEST_VERSION: &str = "Manifest-Version";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("manifest is not valid UTF-8")]
    NotUtf8,

    #[error("line {line}: expected 'Name: value', found '{text}'")]
    InvalidLine { line: usize, text: String },

    #[error("line {line}: continuation line without a preceding attribute")]
    OrphanContinuation { line: usize },

    #[error("line {line}: section does not start with a Name attribute")]
    MissingName { line: usize },
}

/// Ordered, case-insensitive attribute map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set an attribute, replacing any existing value in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Set an attribute only if it is not present yet
    pub fn insert_if_absent(&mut self, name: &str, value: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.entries.push((name.to_string(), value.to_string()));
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed or composed manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub main: Attributes,
    sections: Vec<(String, Attributes)>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, name: &str) -> Option<&Attributes> {
        self.sections.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    /// Named section, created empty at the end if missing
    pub fn section_mut(&mut self, name: &str) -> &mut Attributes {
        let idx = match self.sections.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.sections.push((name.to_string(), Attributes::new()));
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx].1
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &Attributes)> {
        self.sections.iter().map(|(n, a)| (n.as_str(), a))
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ManifestError::NotUtf8)?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        // Join continuation lines first, remembering where each logical line started
        let mut logical: Vec<(usize, String)> = Vec::new();
        for (idx, raw) in text.split('\n').enumerate() {
            let line_no = idx + 1;
            let raw = raw.strip_suffix('\r').unwrap_or(raw);
            if let Some(rest) = raw.strip_prefix(' ') {
                match logical.last_mut() {
                    Some((_, current)) if !current.is_empty() => current.push_str(rest),
                    _ => return Err(ManifestError::OrphanContinuation { line: line_no }),
                }
            } else {
                logical.push((line_no, raw.to_string()));
            }
        }

        let mut manifest = Manifest::new();
        let mut current: Option<(String, Attributes)> = None;
        let mut in_main = true;
        let mut section_start = true;

        for (line_no, line) in logical {
            if line.is_empty() {
                if let Some((name, attrs)) = current.take() {
                    manifest.sections.push((name, attrs));
                }
                in_main = false;
                section_start = true;
                continue;
            }

            let (name, value) = line.split_once(':').ok_or_else(|| ManifestError::InvalidLine {
                line: line_no,
                text: line.clone(),
            })?;
            let name = name.trim_end();
            let value = value.strip_prefix(' ').unwrap_or(value);
            if name.is_empty() || name.contains(' ') {
                return Err(ManifestError::InvalidLine {
                    line: line_no,
                    text: line.clone(),
                });
            }

            if in_main {
                manifest.main.insert(name, value);
            } else if section_start {
                if !name.eq_ignore_ascii_case("Name") {
                    return Err(ManifestError::MissingName { line: line_no });
                }
                current = Some((value.to_string(), Attributes::new()));
            } else if let Some((_, attrs)) = current.as_mut() {
                attrs.insert(name, value);
            }
            section_start = false;
        }

        if let Some((name, attrs)) = current.take() {
            manifest.sections.push((name, attrs));
        }
        Ok(manifest)
    }

    /// Serialize with `Manifest-Version` first
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();

        let version = self.main.get(MANIFEST_VERSION).unwrap_or("1.0");
        write_attribute(&mut out, MANIFEST_VERSION, version);
        for (name, value) in self.main.iter() {
            if !name.eq_ignore_ascii_case(MANIFEST_VERSION) {
                write_attribute(&mut out, name, value);
            }
        }
        out.extend_from_slice(b"\r\n");

        for (name, attrs) in &self.sections {
            if attrs.is_empty() {
                continue;
            }
            write_attribute(&mut out, "Name", name);
            for (key, value) in attrs.iter() {
                write_attribute(&mut out, key, value);
            }
            out.extend_from_slice(b"\r\n");
        }

        out
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

/// Write one `Name: value` header, wrapped at the line limit
fn write_attribute(out: &mut Vec<u8>, name: &str, value: &str) {
    let line = format!("{}: {}", name, value);
    let mut rest = line.as_str();
    let mut limit = LINE_LIMIT;

    loop {
        if rest.len() <= limit {
            out.extend_from_slice(rest.as_bytes());
            out.extend_from_slice(b"\r\n");
            return;
        }
        let mut split = limit;
        while !rest.is_char_boundary(split) {
            split -= 1;
        }
        out.extend_from_slice(rest[..split].as_bytes());
        out.extend_from_slice(b"\r\n ");
        rest = &rest[split..];
        // Continuation lines spend one byte on the leading space
        limit = LINE_LIMIT - 1;
    }
}
