// src/relocate/resource.rs

//! Relocation of line-oriented text resources
//!
//! Service descriptors and similar files list one fully-qualified type name
//! per line, optionally followed by a `#` comment. Lines whose content looks
//! like a dotted type name are rewritten; everything else, including
//! comments and whitespace, is kept as-is.

use super::rules::Relocator;
use crate::error::{Error, Result};
use glob::Pattern;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// An identifier sequence separated by dots, with at least one dot
static TYPE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)+$").expect("valid regex")
});

/// Paths treated as text resources when nothing else is configured
pub const DEFAULT_TEXT_RESOURCES: &[&str] = &["META-INF/services/*"];

/// Which entry paths get line-by-line relocation
#[derive(Debug, Clone, Default)]
pub struct TextResources {
    patterns: Vec<Pattern>,
}

impl TextResources {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| Error::InvalidPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn defaults() -> Self {
        let defaults: Vec<String> = DEFAULT_TEXT_RESOURCES.iter().map(|s| s.to_string()).collect();
        Self::new(&defaults).unwrap_or_default()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

/// Does this text look like a fully-qualified dotted type name?
pub fn looks_like_type_name(text: &str) -> bool {
    TYPE_NAME.is_match(text)
}

/// Rewrite type-name lines of a text resource
///
/// Returns `None` when the content is not UTF-8 or no line changed.
pub fn relocate_lines(bytes: &[u8], relocator: &Relocator) -> Option<Vec<u8>> {
    if relocator.is_empty() {
        return None;
    }
    let text = std::str::from_utf8(bytes).ok()?;

    let mut changed = false;
    let mut out = String::with_capacity(text.len() + 64);
    for line in text.split_inclusive('\n') {
        match relocate_line(line, relocator) {
            Cow::Borrowed(l) => out.push_str(l),
            Cow::Owned(l) => {
                changed = true;
                out.push_str(&l);
            }
        }
    }

    changed.then(|| out.into_bytes())
}

fn relocate_line<'a>(line: &'a str, relocator: &Relocator) -> Cow<'a, str> {
    let content_end = line.find('#').unwrap_or(line.len());
    let content = &line[..content_end];
    let trimmed = content.trim();
    if trimmed.is_empty() || !looks_like_type_name(trimmed) {
        return Cow::Borrowed(line);
    }

    match relocator.relocate_type_name(trimmed) {
        Cow::Borrowed(_) => Cow::Borrowed(line),
        Cow::Owned(relocated) => {
            // Content is trimmed, so the name sits at its first non-blank byte
            let start = content.len() - content.trim_start().len();
            let end = start + trimmed.len();
            Cow::Owned(format!("{}{}{}", &line[..start], relocated, &line[end..]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relocate::RelocationRule;

    fn relocator() -> Relocator {
        Relocator::new(&[RelocationRule::new("com.example.lib", "bundled.lib")]).unwrap()
    }

    #[test]
    fn test_type_name_heuristic() {
        assert!(looks_like_type_name("com.example.lib.Widget"));
        assert!(looks_like_type_name("a.b$Inner"));
        assert!(!looks_like_type_name("Widget"));
        assert!(!looks_like_type_name("not a type"));
        assert!(!looks_like_type_name("com.example.lib.Widget()"));
        assert!(!looks_like_type_name("1com.example"));
    }

    #[test]
    fn test_service_lines_rewritten() {
        let input = b"# providers\ncom.example.lib.WidgetImpl\r\n  com.example.lib.Other # trailing\norg.other.Impl\n";
        let output = relocate_lines(input, &relocator()).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "# providers\nbundled.lib.WidgetImpl\r\n  bundled.lib.Other # trailing\norg.other.Impl\n"
        );
    }

    #[test]
    fn test_unchanged_and_binary_content() {
        assert_eq!(relocate_lines(b"org.other.Impl\n", &relocator()), None);
        assert_eq!(relocate_lines(&[0xff, 0xfe, 0x00], &relocator()), None);
    }

    #[test]
    fn test_text_resource_patterns() {
        let text = TextResources::defaults();
        assert!(text.matches("META-INF/services/com.example.lib.Widget"));
        assert!(!text.matches("com/example/lib/Widget.class"));
        assert!(TextResources::new(&["[".to_string()]).is_err());
    }
}
