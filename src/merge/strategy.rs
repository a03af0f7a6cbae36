// src/merge/strategy.rs

//! Merge strategies and path bindings
//!
//! A binding ties an output path glob to a [`MergeStrategy`]. Bindings are
//! consulted in order: the reserved manifest binding, then user bindings,
//! then the built-in defaults. The first match decides.

use crate::archive::MANIFEST_PATH;
use crate::error::{Error, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use super::log4j::PLUGIN_CACHE_PATH;

/// What to do when several modules contribute the same output path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MergeStrategy {
    /// Drop the path entirely
    Exclude,
    /// Keep the first contribution in module order, drop the rest
    FirstWins,
    /// Concatenate lines, dropping repeats
    LineConcat,
    /// Merge service-provider records
    ServiceMerge,
    /// Merge Log4j 2 plugin caches into one index
    #[serde(rename = "log4j-plugin-cache")]
    #[strum(to_string = "log4j-plugin-cache")]
    Log4jPluginCacheMerge,
}

impl MergeStrategy {
    /// Strategies that combine every contribution into new content
    pub fn combines(&self) -> bool {
        matches!(
            self,
            Self::LineConcat | Self::ServiceMerge | Self::Log4jPluginCacheMerge
        )
    }
}

/// A merge binding as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRule {
    pub pattern: String,
    pub strategy: MergeStrategy,
}

impl MergeRule {
    pub fn new(pattern: impl Into<String>, strategy: MergeStrategy) -> Self {
        Self {
            pattern: pattern.into(),
            strategy,
        }
    }
}

/// Where a binding came from, for the assembly report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum BindingOrigin {
    Reserved,
    User,
    Default,
}

/// A compiled binding
#[derive(Debug, Clone)]
pub struct MergeBinding {
    pattern: Pattern,
    strategy: MergeStrategy,
    origin: BindingOrigin,
}

impl MergeBinding {
    fn compile(rule: &MergeRule, origin: BindingOrigin) -> Result<Self> {
        let pattern = Pattern::new(&rule.pattern).map_err(|e| Error::InvalidPattern {
            pattern: rule.pattern.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern,
            strategy: rule.strategy,
            origin,
        })
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    pub fn origin(&self) -> BindingOrigin {
        self.origin
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Human-readable rule description, e.g. `default: META-INF/*.SF`
    pub fn describe(&self) -> String {
        format!("{}: {}", self.origin, self.pattern.as_str())
    }
}

/// Built-in bindings installed unless disabled
pub fn default_rules() -> Vec<MergeRule> {
    use MergeStrategy::*;
    vec![
        MergeRule::new("META-INF/INDEX.LIST", Exclude),
        MergeRule::new("META-INF/*.SF", Exclude),
        MergeRule::new("META-INF/*.DSA", Exclude),
        MergeRule::new("META-INF/*.RSA", Exclude),
        MergeRule::new("META-INF/*.EC", Exclude),
        MergeRule::new("module-info.class", Exclude),
        MergeRule::new("META-INF/versions/*/module-info.class", Exclude),
        MergeRule::new("META-INF/services/*", ServiceMerge),
        MergeRule::new(PLUGIN_CACHE_PATH, Log4jPluginCacheMerge),
        MergeRule::new("*.class", FirstWins),
    ]
}

/// Ordered binding table
#[derive(Debug, Clone)]
pub struct BindingTable {
    bindings: Vec<MergeBinding>,
}

impl BindingTable {
    /// Build the table from user rules, optionally followed by the defaults
    pub fn new(user: &[MergeRule], with_defaults: bool) -> Result<Self> {
        let reserved = MergeRule::new(MANIFEST_PATH, MergeStrategy::Exclude);
        let mut bindings = vec![MergeBinding::compile(&reserved, BindingOrigin::Reserved)?];

        for rule in user {
            bindings.push(MergeBinding::compile(rule, BindingOrigin::User)?);
        }
        if with_defaults {
            for rule in default_rules() {
                bindings.push(MergeBinding::compile(&rule, BindingOrigin::Default)?);
            }
        }

        Ok(Self { bindings })
    }

    /// First binding whose pattern matches the path
    pub fn lookup(&self, path: &str) -> Option<&MergeBinding> {
        self.bindings.iter().find(|b| b.pattern.matches(path))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        // Built-in patterns are known to compile
        Self::new(&[], true).unwrap_or(Self {
            bindings: Vec::new(),
        })
    }
}
