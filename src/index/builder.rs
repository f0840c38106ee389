//! Index builder: raw symbol declarations in, manifest and shards out.
//!
//! The pipeline is validate → dedupe `(key, location)` → compose overload
//! labels → bucket by key prefix → split oversized buckets by category group
//! (and, if still oversized, by one more key character).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::BuilderConfig;
use crate::error::{MalformedSymbolError, Result, SymshardError};
use crate::index::manifest::{
    key_alphabet, IndexManifest, ManifestEntry, PartitionKey, MANIFEST_FILE, MANIFEST_FORMAT_VERSION,
};
use crate::index::shard::Shard;
use crate::types::{char_prefix, fold_key, CategoryGroup, Location, RawSymbol, SymbolEntry};

/// Accumulates raw symbols and turns them into an index.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    config: BuilderConfig,
    known_pages: Option<HashSet<String>>,
    symbols: Vec<RawSymbol>,
}

/// Everything one build produced.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub manifest: IndexManifest,
    /// Shard bodies keyed by shard identifier.
    pub shards: BTreeMap<String, Shard>,
    /// Symbols that were rejected, in input order.
    pub diagnostics: Vec<MalformedSymbolError>,
    /// Inputs dropped because the same `(key, location)` was already emitted.
    pub duplicates: usize,
}

/// A symbol that passed validation and deduplication.
struct Accepted {
    raw: RawSymbol,
    name: String,
    key: String,
    scope: Option<String>,
    location: Location,
}

impl IndexBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            known_pages: None,
            symbols: Vec::new(),
        }
    }

    /// Restrict locations to these site pages (paths relative to the site root).
    pub fn with_known_pages<I, S>(mut self, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_pages = Some(pages.into_iter().map(Into::into).collect());
        self
    }

    pub fn add(&mut self, symbol: RawSymbol) {
        self.symbols.push(symbol);
    }

    pub fn extend<I: IntoIterator<Item = RawSymbol>>(&mut self, symbols: I) {
        self.symbols.extend(symbols);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Run the build.
    ///
    /// Only an invalid configuration fails the whole build; bad symbols end
    /// up in [`BuildOutput::diagnostics`].
    pub fn build(mut self) -> Result<BuildOutput> {
        self.config.validate()?;
        let symbols = std::mem::take(&mut self.symbols);

        let mut diagnostics = Vec::new();
        let mut duplicates = 0;
        let mut seen: HashSet<(String, Location)> = HashSet::new();
        let mut accepted = Vec::with_capacity(symbols.len());

        for raw in symbols {
            match self.check(&raw) {
                Ok((key, location)) => {
                    if !seen.insert((key.clone(), location.clone())) {
                        tracing::debug!(name = %raw.name, %location, "dropping duplicate symbol");
                        duplicates += 1;
                        continue;
                    }
                    let scope = raw
                        .scope
                        .as_deref()
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string);
                    accepted.push(Accepted {
                        name: raw.name.trim().to_string(),
                        key,
                        scope,
                        location,
                        raw,
                    });
                }
                Err(diag) => {
                    tracing::warn!("{diag}");
                    diagnostics.push(diag);
                }
            }
        }

        let labels = compose_labels(&accepted);
        let entries: Vec<SymbolEntry> = accepted
            .into_iter()
            .zip(labels)
            .map(|(a, label)| SymbolEntry {
                key: a.key,
                scope: a.scope,
                label,
                category: a.raw.kind,
                location: a.location,
                name: a.name,
            })
            .collect();

        let entry_count = entries.len();
        let (partitions, shards) = partition(entries, &self.config);
        let manifest = IndexManifest {
            format_version: MANIFEST_FORMAT_VERSION,
            build_id: build_id(&shards)?,
            built_at: chrono::Utc::now().to_rfc3339(),
            prefix_len: self.config.prefix_len,
            max_shard_entries: self.config.max_shard_entries,
            partitions,
        };

        tracing::info!(
            entries = entry_count,
            shards = shards.len(),
            malformed = diagnostics.len(),
            duplicates,
            build_id = %manifest.build_id,
            "index built"
        );

        Ok(BuildOutput {
            manifest,
            shards,
            diagnostics,
            duplicates,
        })
    }

    fn check(&self, raw: &RawSymbol) -> std::result::Result<(String, Location), MalformedSymbolError> {
        let key = fold_key(&raw.name);
        if key.is_empty() {
            return Err(MalformedSymbolError::new(&raw.name, &raw.location, "empty name"));
        }
        let location = Location::parse(&raw.location)
            .map_err(|reason| MalformedSymbolError::new(&raw.name, &raw.location, reason))?;
        if let Some(pages) = &self.known_pages {
            if !pages.contains(location.site_page()) {
                return Err(MalformedSymbolError::new(
                    &raw.name,
                    &raw.location,
                    format!("page `{}` does not exist in the site", location.site_page()),
                ));
            }
        }
        Ok((key, location))
    }
}

/// Label for every accepted symbol, index-aligned with `accepted`.
///
/// Callables sharing a key within one scope get `Name(params)` labels, and a
/// ` [n]` ordinal if two overloads still print the same.
fn compose_labels(accepted: &[Accepted]) -> Vec<String> {
    let mut labels: Vec<String> = accepted.iter().map(|a| a.name.clone()).collect();

    let mut overloads: HashMap<(&str, Option<&str>), Vec<usize>> = HashMap::new();
    for (idx, a) in accepted.iter().enumerate() {
        if a.raw.kind.is_callable() {
            overloads
                .entry((a.key.as_str(), a.scope.as_deref()))
                .or_default()
                .push(idx);
        }
    }

    for members in overloads.values().filter(|m| m.len() > 1) {
        let mut used: HashMap<String, usize> = HashMap::new();
        for &idx in members {
            let a = &accepted[idx];
            let signature = a
                .raw
                .signature
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("()");
            let base = format!("{}{}", a.name, signature);
            let seen = used.entry(base.clone()).or_insert(0);
            *seen += 1;
            labels[idx] = if *seen == 1 {
                base
            } else {
                format!("{base} [{seen}]")
            };
        }
    }

    labels
}

/// Bucket entries into shards and describe them in manifest entries.
fn partition(
    entries: Vec<SymbolEntry>,
    config: &BuilderConfig,
) -> (Vec<ManifestEntry>, BTreeMap<String, Shard>) {
    let depth = config.prefix_len;
    let max = config.max_shard_entries;

    let mut buckets: BTreeMap<String, Vec<SymbolEntry>> = BTreeMap::new();
    for entry in entries {
        buckets
            .entry(char_prefix(&entry.key, depth).to_string())
            .or_default()
            .push(entry);
    }

    let mut manifest = Vec::new();
    let mut shards = BTreeMap::new();
    let mut emit = |id: String, partition: PartitionKey, entries: Vec<SymbolEntry>| {
        manifest.push(ManifestEntry {
            partition,
            shard: id.clone(),
            entries: entries.len(),
            alphabet: key_alphabet(entries.iter().map(|e| e.key.as_str())),
        });
        shards.insert(id, Shard::from_entries(entries));
    };

    for (ordinal, (prefix, entries)) in buckets.into_iter().enumerate() {
        if entries.len() <= max {
            emit(
                format!("all_{ordinal}"),
                PartitionKey::new(prefix, depth, None),
                entries,
            );
            continue;
        }

        let mut by_group: BTreeMap<CategoryGroup, Vec<SymbolEntry>> = BTreeMap::new();
        for entry in entries {
            by_group.entry(entry.category.group()).or_default().push(entry);
        }

        for (group, entries) in by_group {
            // A prefix shorter than the depth is a single key and cannot split further.
            if entries.len() <= max || prefix.chars().count() < depth {
                emit(
                    format!("{group}_{ordinal}"),
                    PartitionKey::new(prefix.clone(), depth, Some(group)),
                    entries,
                );
                continue;
            }

            let mut by_sub: BTreeMap<String, Vec<SymbolEntry>> = BTreeMap::new();
            for entry in entries {
                by_sub
                    .entry(char_prefix(&entry.key, depth + 1).to_string())
                    .or_default()
                    .push(entry);
            }
            for (sub_ordinal, (sub_prefix, entries)) in by_sub.into_iter().enumerate() {
                if entries.len() > max {
                    tracing::warn!(
                        prefix = %sub_prefix,
                        %group,
                        entries = entries.len(),
                        max,
                        "shard still exceeds max_shard_entries after splitting"
                    );
                }
                emit(
                    format!("{group}_{ordinal}_{sub_ordinal}"),
                    PartitionKey::new(sub_prefix, depth + 1, Some(group)),
                    entries,
                );
            }
        }
    }

    manifest.sort_by(|a, b| a.partition.cmp(&b.partition));
    (manifest, shards)
}

/// Short content hash over every shard identifier and body.
fn build_id(shards: &BTreeMap<String, Shard>) -> Result<String> {
    let mut hasher = Sha256::new();
    for (id, shard) in shards {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
        hasher.update(shard.to_jsonl_bytes()?);
    }
    Ok(hex::encode(hasher.finalize())[..16].to_string())
}

impl BuildOutput {
    pub fn entry_count(&self) -> usize {
        self.shards.values().map(Shard::len).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Write `manifest.json` and `shards/*.jsonl` into `dir`.
    ///
    /// Any previous `shards/` directory is replaced so the directory holds
    /// exactly one build.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let shard_dir = dir.join("shards");
        if shard_dir.exists() {
            std::fs::remove_dir_all(&shard_dir)?;
        }
        std::fs::create_dir_all(&shard_dir)?;

        for entry in &self.manifest.partitions {
            let shard = self.shards.get(&entry.shard).ok_or_else(|| {
                SymshardError::Other(format!("manifest names missing shard `{}`", entry.shard))
            })?;
            let file = std::fs::File::create(dir.join(entry.resource_path()))?;
            shard.write_jsonl(std::io::BufWriter::new(file))?;
        }

        std::fs::write(dir.join(MANIFEST_FILE), self.manifest.to_json_pretty()?)?;
        tracing::info!(
            dir = %dir.display(),
            shards = self.manifest.partitions.len(),
            "index written"
        );
        Ok(())
    }

    /// Read a whole index directory back, every shard included.
    pub fn read_from(dir: &Path) -> Result<Self> {
        let manifest = IndexManifest::load(dir)?;
        let mut shards = BTreeMap::new();
        for entry in &manifest.partitions {
            let file = std::fs::File::open(dir.join(entry.resource_path()))?;
            let shard = Shard::read_from(std::io::BufReader::new(file))?;
            shards.insert(entry.shard.clone(), shard);
        }
        Ok(Self {
            manifest,
            shards,
            diagnostics: Vec::new(),
            duplicates: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
