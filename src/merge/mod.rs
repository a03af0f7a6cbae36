// src/merge/mod.rs

//! Merge conflict resolution
//!
//! Every relocated entry from a MERGE module is offered to a
//! [`MergeResolver`] in module order. The resolver owns the map from output
//! path to content and applies the [`MergeStrategy`] bound to each path. A
//! path with no binding and two different contributions is a fatal
//! conflict.

pub mod log4j;
mod resolver;
mod services;
mod strategy;

pub use log4j::{PluginCache, PluginCacheMerge, PluginEntry, PLUGIN_CACHE_PATH};
pub use resolver::{MergeResolver, ResolvedEntries};
pub use services::{service_records, LineConcat, ServiceMerge};
pub use strategy::{default_rules, BindingOrigin, BindingTable, MergeBinding, MergeRule, MergeStrategy};

use crate::archive::ArchiveEntry;
use crate::error::Result;

/// Produces combined content for a path that several modules contribute to
pub trait ContentMerger: Send + Sync {
    fn strategy(&self) -> MergeStrategy;

    /// Combine contributions, given in module order
    fn merge(&self, path: &str, parts: &[&ArchiveEntry]) -> Result<Vec<u8>>;
}

/// Merger implementing a combining strategy
pub fn merger_for(strategy: MergeStrategy) -> Option<&'static dyn ContentMerger> {
    match strategy {
        MergeStrategy::LineConcat => Some(&LineConcat),
        MergeStrategy::ServiceMerge => Some(&ServiceMerge),
        MergeStrategy::Log4jPluginCacheMerge => Some(&PluginCacheMerge),
        MergeStrategy::Exclude | MergeStrategy::FirstWins => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merger_for_combining_strategies() {
        for strategy in [
            MergeStrategy::LineConcat,
            MergeStrategy::ServiceMerge,
            MergeStrategy::Log4jPluginCacheMerge,
        ] {
            assert!(strategy.combines());
            assert_eq!(merger_for(strategy).unwrap().strategy(), strategy);
        }
        assert!(merger_for(MergeStrategy::FirstWins).is_none());
        assert!(merger_for(MergeStrategy::Exclude).is_none());
    }
}
