//! Query matching, overload grouping, and per-group ranking.
//!
//! Matching runs over shards the loader has already produced, so it is a
//! pure function of (query, shards). Entries that start with the folded
//! query form the prefix tier; entries that merely contain it form the
//! substring tier. Within a tier the shard order `(key, scope, label)` is the
//! rank.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::config::SearchConfig;
use crate::index::{PartitionKey, Shard};
use crate::types::{fold_key, Category, CategoryGroup, Location, SymbolEntry};

/// Which rule matched an entry. Earlier tiers rank first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Prefix,
    Substring,
}

/// One place a result item can navigate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub label: String,
    pub location: Location,
}

/// A ranked result: a single symbol, or every overload of one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub category: Category,
    pub tier: MatchTier,
    pub targets: Vec<Target>,
}

impl ResultItem {
    pub fn is_overload_group(&self) -> bool {
        self.targets.len() > 1
    }
}

/// Items of one display group, in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultGroup {
    pub group: CategoryGroup,
    pub items: Vec<ResultItem>,
    /// Items dropped by the group cap.
    pub truncated: usize,
}

/// Everything one query produced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SearchResults {
    pub query: String,
    /// Session generation that produced these results.
    pub generation: u64,
    pub groups: Vec<ResultGroup>,
    /// Partitions whose shard failed to load.
    pub degraded: Vec<PartitionKey>,
    /// Total items dropped by group caps.
    pub truncated: usize,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// Number of items shown across all groups.
    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    pub fn group(&self, group: CategoryGroup) -> Option<&ResultGroup> {
        self.groups.iter().find(|g| g.group == group)
    }

    /// Items in display order across groups.
    pub fn items(&self) -> impl Iterator<Item = &ResultItem> {
        self.groups.iter().flat_map(|g| g.items.iter())
    }
}

/// Stateless matcher configured with display caps.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: SearchConfig,
}

impl Matcher {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Match `query` against `shards` and build grouped, capped results.
    ///
    /// `shards` should be the shards routed for `query`; `degraded` lists
    /// the routed partitions that failed to load.
    pub fn search<'a, I>(&self, query: &str, shards: I, degraded: Vec<PartitionKey>) -> SearchResults
    where
        I: IntoIterator<Item = &'a Shard>,
    {
        let folded = fold_key(query);
        let mut results = SearchResults {
            query: query.to_string(),
            degraded,
            ..SearchResults::default()
        };
        if folded.is_empty() {
            return results;
        }

        let mut prefix: Vec<&SymbolEntry> = Vec::new();
        let mut substring: Vec<&SymbolEntry> = Vec::new();
        for shard in shards {
            prefix.extend(shard.prefix_range(&folded));
            if self.config.substring_matches {
                substring.extend(
                    shard
                        .iter()
                        .filter(|e| !e.key.starts_with(&folded) && e.key.contains(&folded)),
                );
            }
        }

        let mut items: Vec<ResultItem> = Vec::new();
        for (tier, mut entries) in [(MatchTier::Prefix, prefix), (MatchTier::Substring, substring)] {
            entries.sort();
            entries.dedup();
            collapse(tier, &entries, &mut items);
        }

        let mut grouped: BTreeMap<CategoryGroup, Vec<ResultItem>> = BTreeMap::new();
        for item in items {
            grouped.entry(item.category.group()).or_default().push(item);
        }
        for (group, mut items) in grouped {
            let cap = self.config.cap_for(group);
            let truncated = items.len().saturating_sub(cap);
            items.truncate(cap);
            results.truncated += truncated;
            results.groups.push(ResultGroup {
                group,
                items,
                truncated,
            });
        }

        tracing::debug!(
            query = %results.query,
            items = results.item_count(),
            truncated = results.truncated,
            degraded = results.degraded.len(),
            "matched"
        );
        results
    }
}

/// Append ranked entries of one tier as items, folding function overloads
/// that share `(key, scope)` into one item.
fn collapse(tier: MatchTier, entries: &[&SymbolEntry], items: &mut Vec<ResultItem>) {
    let mut overloads: HashMap<(&str, Option<&str>), usize> = HashMap::new();
    for entry in entries {
        let target = Target {
            label: entry.label.clone(),
            location: entry.location.clone(),
        };
        if entry.category.is_callable() {
            let key = (entry.key.as_str(), entry.scope.as_deref());
            if let Some(&idx) = overloads.get(&key) {
                items[idx].targets.push(target);
                continue;
            }
            overloads.insert(key, items.len());
        }
        items.push(ResultItem {
            name: entry.name.clone(),
            scope: entry.scope.clone(),
            category: entry.category,
            tier,
            targets: vec![target],
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
