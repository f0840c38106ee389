//! Lazy, single-flight shard loading.
//!
//! A [`ShardLoader`] owns the manifest and a pluggable [`ShardSource`]. The
//! first request for a partition fetches its shard; concurrent requests for
//! the same partition wait on that one fetch. Loaded shards stay cached for
//! the loader's lifetime. Failed fetches are not cached.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::error::{Result, ShardLoadError, SymshardError};
use crate::index::{BuildOutput, IndexManifest, ManifestEntry, PartitionKey, Shard};
use crate::observability::validate_path;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where shard bodies come from.
pub trait ShardSource: Send + Sync {
    /// Fetch and decode the shard serving `entry`.
    fn fetch(&self, entry: &ManifestEntry) -> impl Future<Output = Result<Shard>> + Send;
}

/// Reads shards from an index directory written by
/// [`BuildOutput::write_to`].
#[derive(Debug, Clone)]
pub struct FsShardSource {
    root: PathBuf,
}

impl FsShardSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ShardSource for FsShardSource {
    async fn fetch(&self, entry: &ManifestEntry) -> Result<Shard> {
        let path = validate_path(&entry.resource_path(), &self.root).map_err(SymshardError::Other)?;
        let bytes = tokio::fs::read(&path).await?;
        Shard::read_from(bytes.as_slice())
    }
}

/// Serves shards straight from a build, without touching disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryShardSource {
    shards: HashMap<String, Arc<Shard>>,
}

impl MemoryShardSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_build(output: &BuildOutput) -> Self {
        let shards = output
            .shards
            .iter()
            .map(|(id, shard)| (id.clone(), Arc::new(shard.clone())))
            .collect();
        Self { shards }
    }

    pub fn insert(&mut self, id: impl Into<String>, shard: Shard) {
        self.shards.insert(id.into(), Arc::new(shard));
    }

    /// Drop one shard so fetches for it fail.
    pub fn without(mut self, id: &str) -> Self {
        self.shards.remove(id);
        self
    }
}

impl ShardSource for MemoryShardSource {
    async fn fetch(&self, entry: &ManifestEntry) -> Result<Shard> {
        self.shards
            .get(&entry.shard)
            .map(|shard| Shard::clone(shard))
            .ok_or_else(|| SymshardError::Other(format!("no shard `{}` in memory", entry.shard)))
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Counters for cache behaviour.
#[derive(Debug, Default)]
pub struct LoaderStats {
    hits: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
}

impl LoaderStats {
    /// Requests served from an already-loaded (or concurrently loading) shard.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Calls into the shard source.
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

type Slot = Arc<OnceCell<Arc<Shard>>>;

/// Outcome of loading one routed partition.
pub type PartitionLoad = (PartitionKey, std::result::Result<Arc<Shard>, ShardLoadError>);

/// Per-session shard cache in front of a [`ShardSource`].
pub struct ShardLoader<S> {
    manifest: Arc<IndexManifest>,
    source: S,
    slots: Mutex<HashMap<PartitionKey, Slot>>,
    stats: LoaderStats,
}

impl<S: ShardSource> ShardLoader<S> {
    pub fn new(manifest: Arc<IndexManifest>, source: S) -> Self {
        Self {
            manifest,
            source,
            slots: Mutex::new(HashMap::new()),
            stats: LoaderStats::default(),
        }
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn stats(&self) -> &LoaderStats {
        &self.stats
    }

    /// Partitions whose shards are cached.
    pub fn loaded(&self) -> BTreeSet<PartitionKey> {
        self.lock_slots()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Return the shard for `partition`, fetching it at most once.
    pub async fn ensure_loaded(
        &self,
        partition: &PartitionKey,
    ) -> std::result::Result<Arc<Shard>, ShardLoadError> {
        let entry = self.manifest.entry(partition).ok_or_else(|| ShardLoadError {
            partition: partition.to_string(),
            shard: String::new(),
            reason: "partition is not in the manifest".into(),
        })?;

        let slot = {
            let mut slots = self.lock_slots();
            Arc::clone(slots.entry(partition.clone()).or_default())
        };

        let mut fetched = false;
        let result = slot
            .get_or_try_init(|| {
                fetched = true;
                self.stats.fetches.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(partition = %partition, shard = %entry.shard, "fetching shard");
                async move { self.source.fetch(entry).await.map(Arc::new) }
            })
            .await;

        match result {
            Ok(shard) => {
                if !fetched {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Arc::clone(shard))
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(partition = %partition, shard = %entry.shard, "shard load failed: {e}");
                Err(ShardLoadError {
                    partition: partition.to_string(),
                    shard: entry.shard.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Load every partition concurrently, preserving partition order.
    pub async fn load_all(&self, partitions: &BTreeSet<PartitionKey>) -> Vec<PartitionLoad> {
        let loads = partitions.iter().map(|p| async move { (p.clone(), self.ensure_loaded(p).await) });
        futures::future::join_all(loads).await
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<PartitionKey, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuilderConfig;
    use crate::index::IndexBuilder;
    use crate::types::{Category, RawSymbol};
    use tempfile::TempDir;

    fn build() -> BuildOutput {
        let mut builder = IndexBuilder::new(BuilderConfig::default());
        builder.extend([
            RawSymbol::new("CanCastling", Category::Function, "classSayuri_1_1ChessEngine.html#a1")
                .with_scope("Sayuri::ChessEngine")
                .with_signature("(int side) const"),
            RawSymbol::new("CAPTURE", Category::EnumValue, "namespaceSayuri.html#a2").with_scope("Sayuri"),
            RawSymbol::new("Fen", Category::Class, "classSayuri_1_1Fen.html").with_scope("Sayuri"),
        ]);
        builder.build().unwrap()
    }

    fn partition(output: &BuildOutput, prefix: &str) -> PartitionKey {
        output
            .manifest
            .resolve_partitions(prefix)
            .into_iter()
            .next()
            .unwrap()
    }

    #[tokio::test]
    async fn memory_source_loads_once_and_caches() {
        let output = build();
        let loader = ShardLoader::new(
            Arc::new(output.manifest.clone()),
            MemoryShardSource::from_build(&output),
        );
        let c = partition(&output, "c");

        let first = loader.ensure_loaded(&c).await.unwrap();
        let second = loader.ensure_loaded(&c).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 2);
        assert_eq!(loader.stats().fetches(), 1);
        assert_eq!(loader.stats().hits(), 1);
        assert!(loader.loaded().contains(&c));
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let output = build();
        let loader = ShardLoader::new(
            Arc::new(output.manifest.clone()),
            MemoryShardSource::from_build(&output),
        );
        let c = partition(&output, "c");

        let (a, b, d) = tokio::join!(
            loader.ensure_loaded(&c),
            loader.ensure_loaded(&c),
            loader.ensure_loaded(&c)
        );
        assert!(a.is_ok() && b.is_ok() && d.is_ok());
        assert_eq!(loader.stats().fetches(), 1);
    }

    #[tokio::test]
    async fn failed_loads_are_reported_and_retried() {
        let output = build();
        let c = partition(&output, "c");
        let shard_id = output.manifest.entry(&c).unwrap().shard.clone();
        let loader = ShardLoader::new(
            Arc::new(output.manifest.clone()),
            MemoryShardSource::from_build(&output).without(&shard_id),
        );

        let err = loader.ensure_loaded(&c).await.unwrap_err();
        assert_eq!(err.shard, shard_id);
        assert_eq!(err.partition, c.to_string());
        assert!(loader.ensure_loaded(&c).await.is_err());
        assert_eq!(loader.stats().fetches(), 2, "failures must not be cached");
        assert_eq!(loader.stats().failures(), 2);
        assert!(loader.loaded().is_empty());
    }

    #[tokio::test]
    async fn unknown_partition_is_a_load_error() {
        let output = build();
        let loader = ShardLoader::new(
            Arc::new(output.manifest.clone()),
            MemoryShardSource::from_build(&output),
        );
        let err = loader
            .ensure_loaded(&PartitionKey::new("z", 1, None))
            .await
            .unwrap_err();
        assert!(err.reason.contains("not in the manifest"));
        assert_eq!(loader.stats().fetches(), 0);
    }

    #[tokio::test]
    async fn fs_source_reads_written_index() {
        let output = build();
        let dir = TempDir::new().unwrap();
        output.write_to(dir.path()).unwrap();

        let manifest = IndexManifest::load(dir.path()).unwrap();
        let loader = ShardLoader::new(Arc::new(manifest), FsShardSource::new(dir.path()));
        let parts = loader.manifest().resolve_partitions("f");
        let loads = loader.load_all(&parts).await;
        assert_eq!(loads.len(), 1);
        let shard = loads[0].1.as_ref().unwrap();
        assert_eq!(shard.entries()[0].name, "Fen");
    }

    #[tokio::test]
    async fn fs_source_missing_file_fails_cleanly() {
        let output = build();
        let dir = TempDir::new().unwrap();
        output.write_to(dir.path()).unwrap();
        let c = partition(&output, "c");
        let id = output.manifest.entry(&c).unwrap().shard.clone();
        std::fs::remove_file(dir.path().join(format!("shards/{id}.jsonl"))).unwrap();

        let loader = ShardLoader::new(Arc::new(output.manifest.clone()), FsShardSource::new(dir.path()));
        assert!(loader.ensure_loaded(&c).await.is_err());
        assert!(loader.ensure_loaded(&partition(&output, "f")).await.is_ok());
    }
}
