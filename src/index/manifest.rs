//! Index manifest: the routing table from partition keys to shard files.
//!
//! Each [`ManifestEntry`] names the key prefix it covers, how many leading
//! characters it routes on (`depth`), and optionally the one category group
//! it is restricted to. That is the whole splitting rule, so the runtime can
//! route a query without knowing how the builder decided to split.
//!
//! Keys that merely contain a query can live under any prefix, so each entry
//! also records the characters its keys are made of. The substring tier
//! loads only the shards whose alphabet covers the query.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SymshardError};
use crate::types::{fold_key, CategoryGroup};

/// Current manifest format.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// File name of the manifest inside an index directory.
pub const MANIFEST_FILE: &str = "manifest.json";

// ---------------------------------------------------------------------------
// PartitionKey
// ---------------------------------------------------------------------------

/// Routing key of one shard.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    /// Folded key prefix shared by every entry of the shard.
    pub prefix: String,
    /// Number of leading key characters this partition routes on. A prefix
    /// shorter than `depth` holds only the key equal to the prefix.
    pub depth: usize,
    /// Category group restriction, present once a bucket was split by kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<CategoryGroup>,
}

impl PartitionKey {
    pub fn new(prefix: impl Into<String>, depth: usize, group: Option<CategoryGroup>) -> Self {
        Self {
            prefix: prefix.into(),
            depth,
            group,
        }
    }

    /// Whether any key starting with `query` can live in this partition.
    ///
    /// `query` must already be folded and non-empty.
    pub fn may_contain_prefix(&self, query: &str) -> bool {
        if self.prefix.starts_with(query) {
            return true;
        }
        self.prefix.chars().count() == self.depth && query.starts_with(&self.prefix)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.group {
            Some(group) => write!(f, "{}/{}", self.prefix, group),
            None => f.write_str(&self.prefix),
        }
    }
}

// ---------------------------------------------------------------------------
// ManifestEntry
// ---------------------------------------------------------------------------

/// One partition and the shard resource that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub partition: PartitionKey,
    /// Opaque shard identifier, unique within one build.
    pub shard: String,
    /// Number of entries in the shard.
    pub entries: usize,
    /// Sorted distinct characters of every key in the shard. Empty when
    /// unknown, which routes every substring query here.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alphabet: String,
}

impl ManifestEntry {
    /// Whether any key of this shard can contain `query` (folded, non-empty).
    pub fn may_contain_substring(&self, query: &str) -> bool {
        self.alphabet.is_empty() || query.chars().all(|c| self.alphabet.contains(c))
    }

    /// Path of the shard body relative to the index directory.
    pub fn resource_path(&self) -> String {
        format!("shards/{}.jsonl", self.shard)
    }
}

/// Sorted distinct characters of `keys`, as stored in [`ManifestEntry::alphabet`].
pub fn key_alphabet<'a>(keys: impl IntoIterator<Item = &'a str>) -> String {
    keys.into_iter()
        .flat_map(str::chars)
        .collect::<BTreeSet<char>>()
        .into_iter()
        .collect()
}

// ---------------------------------------------------------------------------
// IndexManifest
// ---------------------------------------------------------------------------

/// Immutable snapshot of one index build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    /// Content hash of every shard in this build.
    pub build_id: String,
    /// RFC 3339 build timestamp.
    pub built_at: String,
    /// Leading characters used for first-level buckets.
    pub prefix_len: usize,
    /// Bucket size above which the builder split by category group.
    pub max_shard_entries: usize,
    /// Sorted by partition key.
    pub partitions: Vec<ManifestEntry>,
}

impl IndexManifest {
    /// Every partition that could hold a key starting with `prefix`.
    ///
    /// Pure in `prefix` and `self`; a blank prefix resolves to nothing.
    pub fn resolve_partitions(&self, prefix: &str) -> BTreeSet<PartitionKey> {
        let folded = fold_key(prefix);
        if folded.is_empty() {
            return BTreeSet::new();
        }
        self.partitions
            .iter()
            .filter(|e| e.partition.may_contain_prefix(&folded))
            .map(|e| e.partition.clone())
            .collect()
    }

    /// Every partition that could hold a key containing `query` anywhere.
    ///
    /// A superset of [`resolve_partitions`](Self::resolve_partitions) for the
    /// same query; blank resolves to nothing.
    pub fn resolve_substring_partitions(&self, query: &str) -> BTreeSet<PartitionKey> {
        let folded = fold_key(query);
        if folded.is_empty() {
            return BTreeSet::new();
        }
        self.partitions
            .iter()
            .filter(|e| e.may_contain_substring(&folded) || e.partition.may_contain_prefix(&folded))
            .map(|e| e.partition.clone())
            .collect()
    }

    /// Partitions a search for `query` has to load.
    pub fn route(&self, query: &str, substring_matches: bool) -> BTreeSet<PartitionKey> {
        if substring_matches {
            self.resolve_substring_partitions(query)
        } else {
            self.resolve_partitions(query)
        }
    }

    pub fn entry(&self, partition: &PartitionKey) -> Option<&ManifestEntry> {
        self.partitions
            .binary_search_by(|e| e.partition.cmp(partition))
            .ok()
            .map(|idx| &self.partitions[idx])
    }

    pub fn total_entries(&self) -> usize {
        self.partitions.iter().map(|e| e.entries).sum()
    }

    /// Check structural invariants of a manifest loaded from disk.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MANIFEST_FORMAT_VERSION {
            return Err(SymshardError::Parse(format!(
                "unsupported manifest format version {} (expected {})",
                self.format_version, MANIFEST_FORMAT_VERSION
            )));
        }
        if self.prefix_len == 0 {
            return Err(SymshardError::Parse("manifest prefix_len must be >= 1".into()));
        }
        if self
            .partitions
            .windows(2)
            .any(|w| w[0].partition >= w[1].partition)
        {
            return Err(SymshardError::Parse(
                "manifest partitions must be sorted and unique".into(),
            ));
        }
        let mut shards = HashSet::new();
        for entry in &self.partitions {
            if entry.shard.is_empty()
                || entry.shard.contains(['/', '\\'])
                || entry.shard.starts_with('.')
            {
                return Err(SymshardError::Parse(format!(
                    "invalid shard identifier `{}`",
                    entry.shard
                )));
            }
            if !shards.insert(entry.shard.as_str()) {
                return Err(SymshardError::Parse(format!(
                    "shard `{}` is listed twice",
                    entry.shard
                )));
            }
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load `manifest.json` from an index directory without touching shards.
    pub fn load(index_dir: &Path) -> Result<Self> {
        let path = index_dir.join(MANIFEST_FILE);
        let json = std::fs::read_to_string(&path).map_err(|e| {
            SymshardError::Other(format!("cannot read manifest {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
