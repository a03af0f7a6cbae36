// src/relocate/rules.rs

//! Relocation rules and name rewriting
//!
//! A rule maps a package prefix to a new prefix. Names are matched at
//! segment boundaries, so `com.google` covers `com.google.gson.Gson` but not
//! `com.googlex.Foo`. When several rules match, the longest prefix wins.
//!
//! Every name is held in two forms: dotted (`com.google.gson.Gson`, as in
//! service files) and slashed (`com/google/gson/Gson`, as in class files and
//! entry paths). Rules are compiled for both.

use crate::archive::{split_versioned, versioned_path};
use crate::error::{Error, Result};
use glob::Pattern;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

/// Class references inside descriptors and generic signatures
static DESCRIPTOR_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"L([^;<>:.\[()]+)([;<])").expect("valid regex"));

const SERVICES_PREFIX: &str = "META-INF/services/";

/// A relocation rule as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationRule {
    /// Package prefix to move, e.g. `com.google.gson`
    pub from: String,
    /// New prefix, e.g. `space.vectrix.ignite.libs.gson`
    pub to: String,
    /// Dotted class-name globs this rule leaves alone
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl RelocationRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            exclude: Vec::new(),
        }
    }

    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }
}

impl fmt::Display for RelocationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Name separator used by a name form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Dotted,
    Slashed,
}

impl Form {
    fn separator(self) -> char {
        match self {
            Self::Dotted => '.',
            Self::Slashed => '/',
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    from_dotted: String,
    to_dotted: String,
    from_slashed: String,
    to_slashed: String,
    excludes: Vec<Pattern>,
}

impl CompiledRule {
    fn compile(rule: &RelocationRule) -> Result<Self> {
        let from = normalize_prefix(&rule.from)
            .ok_or_else(|| Error::Config(format!("relocation rule '{}' has an empty source prefix", rule)))?;
        let to = normalize_prefix(&rule.to)
            .ok_or_else(|| Error::Config(format!("relocation rule '{}' has an empty target prefix", rule)))?;

        let excludes = rule
            .exclude
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| Error::InvalidPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            from_slashed: from.replace('.', "/"),
            to_slashed: to.replace('.', "/"),
            from_dotted: from,
            to_dotted: to,
            excludes,
        })
    }

    fn from(&self, form: Form) -> &str {
        match form {
            Form::Dotted => &self.from_dotted,
            Form::Slashed => &self.from_slashed,
        }
    }

    fn to(&self, form: Form) -> &str {
        match form {
            Form::Dotted => &self.to_dotted,
            Form::Slashed => &self.to_slashed,
        }
    }

    fn target_within_source(&self) -> bool {
        under_prefix(&self.to_dotted, &self.from_dotted, '.')
    }

    fn excludes(&self, name: &str, form: Form) -> bool {
        if self.excludes.is_empty() {
            return false;
        }
        let dotted = match form {
            Form::Dotted => Cow::Borrowed(name),
            Form::Slashed => Cow::Owned(name.replace('/', ".")),
        };
        self.excludes.iter().any(|p| p.matches(&dotted))
    }
}

/// Accept both `com.google.gson` and `com/google/gson/`
fn normalize_prefix(prefix: &str) -> Option<String> {
    let normalized = prefix
        .trim()
        .replace('/', ".")
        .trim_matches('.')
        .to_string();
    (!normalized.is_empty()).then_some(normalized)
}

/// Does `name` sit under `prefix` at a segment boundary?
fn under_prefix(name: &str, prefix: &str, separator: char) -> bool {
    match name.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(separator),
        None => false,
    }
}

/// Compiled, ordered set of relocation rules
#[derive(Debug, Clone, Default)]
pub struct Relocator {
    rules: Vec<CompiledRule>,
}

impl Relocator {
    /// Compile rules, rejecting two rules for the same prefix with different targets
    pub fn new(rules: &[RelocationRule]) -> Result<Self> {
        let mut by_prefix: BTreeMap<String, (&RelocationRule, CompiledRule)> = BTreeMap::new();

        for rule in rules {
            let compiled = CompiledRule::compile(rule)?;
            match by_prefix.get(&compiled.from_dotted) {
                Some((existing, existing_compiled)) => {
                    if existing_compiled.to_dotted != compiled.to_dotted {
                        return Err(Error::RelocationAmbiguity {
                            prefix: compiled.from_dotted.clone(),
                            first: existing.to_string(),
                            second: rule.to_string(),
                        });
                    }
                    // Same mapping listed twice; merge the exclusions
                    let mut merged = existing_compiled.clone();
                    merged.excludes.extend(compiled.excludes);
                    let key = compiled.from_dotted.clone();
                    let first = *existing;
                    by_prefix.insert(key, (first, merged));
                }
                None => {
                    by_prefix.insert(compiled.from_dotted.clone(), (rule, compiled));
                }
            }
        }

        let mut compiled: Vec<CompiledRule> = by_prefix.into_values().map(|(_, c)| c).collect();
        compiled.sort_by(|a, b| {
            b.from_dotted
                .len()
                .cmp(&a.from_dotted.len())
                .then_with(|| a.from_dotted.cmp(&b.from_dotted))
        });

        debug!("Compiled {} relocation rules", compiled.len());
        Ok(Self { rules: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Rewrite a slashed internal name such as `com/google/gson/Gson$1`
    pub fn relocate_class_name<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if let Some(descriptor) = name.strip_prefix('[') {
            // Array classes are named by descriptor
            return match self.relocate_descriptor(descriptor) {
                Cow::Borrowed(_) => Cow::Borrowed(name),
                Cow::Owned(relocated) => Cow::Owned(format!("[{}", relocated)),
            };
        }
        self.relocate_in(name, Form::Slashed)
    }

    /// Rewrite a dotted type name such as `com.google.gson.Gson`
    pub fn relocate_type_name<'a>(&self, name: &'a str) -> Cow<'a, str> {
        self.relocate_in(name, Form::Dotted)
    }

    /// Rewrite every class reference in a field, method or generic signature descriptor
    pub fn relocate_descriptor<'a>(&self, descriptor: &'a str) -> Cow<'a, str> {
        if self.rules.is_empty() || !descriptor.contains('L') {
            return Cow::Borrowed(descriptor);
        }

        let mut changed = false;
        let rewritten = DESCRIPTOR_CLASS.replace_all(descriptor, |caps: &Captures| {
            let class = &caps[1];
            match self.relocate_in(class, Form::Slashed) {
                Cow::Owned(relocated) => {
                    changed = true;
                    format!("L{}{}", relocated, &caps[2])
                }
                Cow::Borrowed(_) => caps[0].to_string(),
            }
        });

        if changed {
            Cow::Owned(rewritten.into_owned())
        } else {
            Cow::Borrowed(descriptor)
        }
    }

    /// Rewrite an archive entry path
    ///
    /// Handles class and resource paths, release-specific paths under
    /// `META-INF/versions/<n>/`, and service descriptors whose file name is
    /// a dotted interface name.
    pub fn relocate_path<'a>(&self, path: &'a str) -> Cow<'a, str> {
        if self.rules.is_empty() {
            return Cow::Borrowed(path);
        }

        if let Some((release, base)) = split_versioned(path) {
            return match self.relocate_path(base) {
                Cow::Borrowed(_) => Cow::Borrowed(path),
                Cow::Owned(relocated) => Cow::Owned(versioned_path(release, &relocated)),
            };
        }

        if let Some(service) = path.strip_prefix(SERVICES_PREFIX) {
            if service.is_empty() || service.contains('/') {
                return Cow::Borrowed(path);
            }
            return match self.relocate_type_name(service) {
                Cow::Borrowed(_) => Cow::Borrowed(path),
                Cow::Owned(relocated) => Cow::Owned(format!("{}{}", SERVICES_PREFIX, relocated)),
            };
        }

        let (stem, trailing) = match path.strip_suffix('/') {
            Some(stem) => (stem, "/"),
            None => (path, ""),
        };
        let name = stem.strip_suffix(".class").unwrap_or(stem);
        match self.relocate_in(name, Form::Slashed) {
            Cow::Borrowed(_) => Cow::Borrowed(path),
            Cow::Owned(relocated) => {
                let suffix = &stem[name.len()..];
                Cow::Owned(format!("{}{}{}", relocated, suffix, trailing))
            }
        }
    }

    fn relocate_in<'a>(&self, name: &'a str, form: Form) -> Cow<'a, str> {
        let sep = form.separator();
        let Some(rule) = self
            .rules
            .iter()
            .find(|rule| under_prefix(name, rule.from(form), sep) && !rule.excludes(name, form))
        else {
            return Cow::Borrowed(name);
        };

        // A target nested under its own source would match again on a second pass
        if rule.target_within_source() && under_prefix(name, rule.to(form), sep) {
            return Cow::Borrowed(name);
        }
        Cow::Owned(format!("{}{}", rule.to(form), &name[rule.from(form).len()..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gson() -> Relocator {
        Relocator::new(&[
            RelocationRule::new("com.google.gson", "space.vectrix.ignite.libs.gson"),
            RelocationRule::new("com.google", "space.vectrix.ignite.libs.google"),
        ])
        .unwrap()
    }

    #[test]
    fn test_longest_prefix_wins() {
        let r = gson();
        assert_eq!(
            r.relocate_class_name("com/google/gson/Gson"),
            "space/vectrix/ignite/libs/gson/Gson"
        );
        assert_eq!(
            r.relocate_class_name("com/google/common/collect/ImmutableList"),
            "space/vectrix/ignite/libs/google/common/collect/ImmutableList"
        );
    }

    #[test]
    fn test_segment_boundary() {
        let r = gson();
        assert_eq!(r.relocate_type_name("com.googlex.Thing"), "com.googlex.Thing");
        assert_eq!(r.relocate_type_name("com.google"), "space.vectrix.ignite.libs.google");
        assert!(matches!(r.relocate_type_name("java.lang.String"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_inner_classes() {
        let r = gson();
        assert_eq!(
            r.relocate_class_name("com/google/gson/Gson$FutureTypeAdapter"),
            "space/vectrix/ignite/libs/gson/Gson$FutureTypeAdapter"
        );
    }

    #[test]
    fn test_relocation_is_idempotent() {
        let r = gson();
        let once = r.relocate_type_name("com.google.gson.Gson").into_owned();
        let twice = r.relocate_type_name(&once).into_owned();
        assert_eq!(once, twice);

        let desc = "(Lcom/google/gson/Gson;)Lcom/google/common/base/Optional;";
        let once = r.relocate_descriptor(desc).into_owned();
        assert_eq!(r.relocate_descriptor(&once), once);
    }

    #[test]
    fn test_target_nested_under_source_stays_idempotent() {
        let r = Relocator::new(&[RelocationRule::new("org.objectweb.asm", "org.objectweb.asm.shaded")]).unwrap();
        let once = r.relocate_class_name("org/objectweb/asm/ClassReader").into_owned();
        assert_eq!(once, "org/objectweb/asm/shaded/ClassReader");
        assert_eq!(r.relocate_class_name(&once), once);
    }

    #[test]
    fn test_target_above_source() {
        let r = Relocator::new(&[RelocationRule::new("com.example.lib.internal", "com.example.lib")]).unwrap();
        assert_eq!(
            r.relocate_class_name("com/example/lib/internal/Widget"),
            "com/example/lib/Widget"
        );
        assert_eq!(r.relocate_class_name("com/example/lib/Widget"), "com/example/lib/Widget");
    }

    #[test]
    fn test_source_under_another_rules_target() {
        let r = Relocator::new(&[
            RelocationRule::new("org.tinylog", "space.vectrix.ignite.libs.tinylog"),
            RelocationRule::new("space.vectrix.ignite.libs", "space.vectrix.ignite.shaded"),
        ])
        .unwrap();
        assert_eq!(
            r.relocate_class_name("space/vectrix/ignite/libs/tinylog/Logger"),
            "space/vectrix/ignite/shaded/tinylog/Logger"
        );
        assert_eq!(
            r.relocate_type_name("org.tinylog.Logger"),
            "space.vectrix.ignite.libs.tinylog.Logger"
        );
    }

    #[test]
    fn test_ambiguous_rules_rejected() {
        let err = Relocator::new(&[
            RelocationRule::new("com.google.gson", "a.gson"),
            RelocationRule::new("com/google/gson/", "b.gson"),
        ])
        .unwrap_err();
        match err {
            Error::RelocationAmbiguity { prefix, first, second } => {
                assert_eq!(prefix, "com.google.gson");
                assert!(first.contains("a.gson"));
                assert!(second.contains("b.gson"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_identical_rules_are_merged() {
        let r = Relocator::new(&[
            RelocationRule::new("com.google.gson", "x.gson"),
            RelocationRule::new("com.google.gson", "x.gson"),
        ])
        .unwrap();
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_empty_prefix_rejected() {
        assert!(matches!(
            Relocator::new(&[RelocationRule::new("", "x")]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_rule_exclusions_fall_through_to_shorter_rules() {
        let r = Relocator::new(&[
            RelocationRule::new("com.google.gson", "x.gson").with_exclude("com.google.gson.internal.*"),
            RelocationRule::new("com.google", "x.google"),
        ])
        .unwrap();
        assert_eq!(r.relocate_type_name("com.google.gson.Gson"), "x.gson.Gson");
        assert_eq!(
            r.relocate_class_name("com/google/gson/internal/Excluder"),
            "x/google/gson/internal/Excluder"
        );
    }

    #[test]
    fn test_descriptors_and_signatures() {
        let r = gson();
        assert_eq!(
            r.relocate_descriptor("(ILcom/google/gson/JsonElement;[Lcom/google/gson/Gson;)V"),
            "(ILspace/vectrix/ignite/libs/gson/JsonElement;[Lspace/vectrix/ignite/libs/gson/Gson;)V"
        );
        assert_eq!(
            r.relocate_descriptor("Ljava/util/Map<Ljava/lang/String;Lcom/google/gson/JsonElement;>;"),
            "Ljava/util/Map<Ljava/lang/String;Lspace/vectrix/ignite/libs/gson/JsonElement;>;"
        );
        assert_eq!(
            r.relocate_descriptor("Lcom/google/gson/TypeAdapter<TT;>;"),
            "Lspace/vectrix/ignite/libs/gson/TypeAdapter<TT;>;"
        );
        assert!(matches!(r.relocate_descriptor("(IJ)V"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_array_class_names() {
        let r = gson();
        assert_eq!(
            r.relocate_class_name("[Lcom/google/gson/Gson;"),
            "[Lspace/vectrix/ignite/libs/gson/Gson;"
        );
    }

    #[test]
    fn test_entry_paths() {
        let r = gson();
        assert_eq!(
            r.relocate_path("com/google/gson/Gson.class"),
            "space/vectrix/ignite/libs/gson/Gson.class"
        );
        assert_eq!(r.relocate_path("com/google/gson/"), "space/vectrix/ignite/libs/gson/");
        assert_eq!(
            r.relocate_path("com/google/gson/internal/messages.properties"),
            "space/vectrix/ignite/libs/gson/internal/messages.properties"
        );
        assert_eq!(
            r.relocate_path("META-INF/versions/9/com/google/gson/Gson.class"),
            "META-INF/versions/9/space/vectrix/ignite/libs/gson/Gson.class"
        );
        assert_eq!(
            r.relocate_path("META-INF/services/com.google.gson.TypeAdapterFactory"),
            "META-INF/services/space.vectrix.ignite.libs.gson.TypeAdapterFactory"
        );
        assert_eq!(r.relocate_path("META-INF/LICENSE"), "META-INF/LICENSE");
        assert_eq!(r.relocate_path("com/"), "com/");
    }
}
