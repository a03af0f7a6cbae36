// src/merge/services.rs

//! Line-oriented merges: plain line concatenation and service descriptors

use super::{ContentMerger, MergeStrategy};
use crate::archive::ArchiveEntry;
use crate::error::Result;
use std::collections::HashSet;

/// Concatenates lines from every contribution, dropping repeated lines
///
/// Lines are compared byte for byte after removing the line terminator.
/// Output lines end in `\n`, in first-seen order.
pub struct LineConcat;

impl ContentMerger for LineConcat {
    fn strategy(&self) -> MergeStrategy {
        MergeStrategy::LineConcat
    }

    fn merge(&self, _path: &str, parts: &[&ArchiveEntry]) -> Result<Vec<u8>> {
        let mut seen: HashSet<&[u8]> = HashSet::new();
        let mut out = Vec::new();

        for part in parts {
            for line in split_lines(&part.bytes) {
                if seen.insert(line) {
                    out.extend_from_slice(line);
                    out.push(b'\n');
                }
            }
        }
        Ok(out)
    }
}

/// Merges service-provider registrations
///
/// Each non-comment line is one provider record. Records are trimmed,
/// stripped of trailing comments and de-duplicated; the leading comment
/// block of the first contribution (typically a license header) is kept.
pub struct ServiceMerge;

impl ContentMerger for ServiceMerge {
    fn strategy(&self) -> MergeStrategy {
        MergeStrategy::ServiceMerge
    }

    fn merge(&self, _path: &str, parts: &[&ArchiveEntry]) -> Result<Vec<u8>> {
        let mut out = String::new();

        if let Some(first) = parts.first() {
            let text = String::from_utf8_lossy(&first.bytes);
            for line in text.lines() {
                if !line.trim_start().starts_with('#') {
                    break;
                }
                out.push_str(line.trim_end());
                out.push('\n');
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        for part in parts {
            let text = String::from_utf8_lossy(&part.bytes);
            for record in service_records(&text) {
                if seen.insert(record.to_string()) {
                    out.push_str(record);
                    out.push('\n');
                }
            }
        }

        Ok(out.into_bytes())
    }
}

/// Provider records of a service descriptor, in file order
pub fn service_records(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|record| !record.is_empty())
}

/// Split on `\n`, dropping a trailing `\r` and the empty tail after a final newline
fn split_lines(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let empty = bytes.is_empty();
    body.split(|&b| b == b'\n')
        .filter(move |_| !empty)
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}
