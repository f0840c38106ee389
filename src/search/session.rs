//! Search sessions: routing, loading, matching, and stale-query suppression.
//!
//! Every call to [`SearchSession::search`] takes the next generation number.
//! Once its shard loads complete, a search that is no longer the newest
//! resolves to [`SearchOutcome::Stale`] so a slow early query can never
//! overwrite the results of a later one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::index::IndexManifest;
use crate::observability::Metrics;
use crate::search::loader::{ShardLoader, ShardSource};
use crate::search::matcher::{Matcher, SearchResults};

/// Result of one search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Results(SearchResults),
    /// A newer search was issued while this one was loading shards.
    Stale { query: String, generation: u64 },
}

impl SearchOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Results(results) => results.generation,
            Self::Stale { generation, .. } => *generation,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }

    pub fn results(&self) -> Option<&SearchResults> {
        match self {
            Self::Results(results) => Some(results),
            Self::Stale { .. } => None,
        }
    }

    pub fn into_results(self) -> Option<SearchResults> {
        match self {
            Self::Results(results) => Some(results),
            Self::Stale { .. } => None,
        }
    }
}

/// One search box's worth of state: a shard cache and a generation counter.
pub struct SearchSession<S> {
    loader: ShardLoader<S>,
    matcher: Matcher,
    generation: AtomicU64,
    queries: AtomicU64,
    stale: AtomicU64,
}

impl<S: ShardSource> SearchSession<S> {
    pub fn new(manifest: Arc<IndexManifest>, source: S, config: SearchConfig) -> Self {
        Self {
            loader: ShardLoader::new(manifest, source),
            matcher: Matcher::new(config),
            generation: AtomicU64::new(0),
            queries: AtomicU64::new(0),
            stale: AtomicU64::new(0),
        }
    }

    pub fn loader(&self) -> &ShardLoader<S> {
        &self.loader
    }

    pub fn manifest(&self) -> &IndexManifest {
        self.loader.manifest()
    }

    /// Generation of the most recently issued search.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Run `query`. Blank queries resolve immediately with no results and
    /// load nothing.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.queries.fetch_add(1, Ordering::Relaxed);

        let partitions = self
            .loader
            .manifest()
            .route(query, self.matcher.config().substring_matches);
        let loads = self.loader.load_all(&partitions).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            self.stale.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(query, generation, "discarding stale query");
            return SearchOutcome::Stale {
                query: query.to_string(),
                generation,
            };
        }

        let mut shards = Vec::with_capacity(loads.len());
        let mut degraded = Vec::new();
        for (partition, load) in loads {
            match load {
                Ok(shard) => shards.push(shard),
                Err(_) => degraded.push(partition),
            }
        }
        if !degraded.is_empty() {
            tracing::warn!(query, degraded = degraded.len(), "search results are degraded");
        }

        let mut results = self
            .matcher
            .search(query, shards.iter().map(|s| &**s), degraded);
        results.generation = generation;
        SearchOutcome::Results(results)
    }

    /// Snapshot of runtime counters.
    pub fn metrics(&self) -> Metrics {
        let stats = self.loader.stats();
        Metrics {
            search_queries: self.queries.load(Ordering::Relaxed),
            stale_discarded: self.stale.load(Ordering::Relaxed),
            cache_hits: stats.hits(),
            cache_misses: stats.fetches(),
            shard_load_failures: stats.failures(),
            ..Metrics::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuilderConfig;
    use crate::error::Result;
    use crate::index::{BuildOutput, IndexBuilder, ManifestEntry, Shard};
    use crate::search::loader::MemoryShardSource;
    use crate::types::{Category, CategoryGroup, RawSymbol};
    use tokio::sync::Notify;

    fn build() -> BuildOutput {
        let mut builder = IndexBuilder::new(BuilderConfig::default());
        builder.extend([
            RawSymbol::new("CanCastling", Category::Function, "classSayuri_1_1ChessEngine.html#a0e3b")
                .with_scope("Sayuri::ChessEngine")
                .with_signature("(int side) const"),
            RawSymbol::new("CAPTURE", Category::EnumValue, "namespaceSayuri.html#a5d1f").with_scope("Sayuri"),
            RawSymbol::new("Fen", Category::Class, "classSayuri_1_1Fen.html").with_scope("Sayuri"),
            RawSymbol::new("FEN_START", Category::Macro, "fen_8h.html#a77aa"),
        ]);
        builder.build().unwrap()
    }

    fn session(output: &BuildOutput) -> SearchSession<MemoryShardSource> {
        SearchSession::new(
            Arc::new(output.manifest.clone()),
            MemoryShardSource::from_build(output),
            SearchConfig::default(),
        )
    }

    /// Holds back one shard until notified.
    struct GatedSource {
        inner: MemoryShardSource,
        gated_shard: String,
        gate: Arc<Notify>,
    }

    impl ShardSource for GatedSource {
        async fn fetch(&self, entry: &ManifestEntry) -> Result<Shard> {
            if entry.shard == self.gated_shard {
                self.gate.notified().await;
            }
            self.inner.fetch(entry).await
        }
    }

    #[tokio::test]
    async fn search_returns_grouped_results() {
        let output = build();
        let session = session(&output);
        let outcome = session.search("ca").await;
        let results = outcome.results().unwrap();
        assert_eq!(results.generation, 1);
        assert!(results.group(CategoryGroup::Functions).is_some());
        assert!(results.group(CategoryGroup::Enums).is_some());
        assert!(!results.is_degraded());
    }

    #[tokio::test]
    async fn empty_query_loads_nothing() {
        let output = build();
        let session = session(&output);
        let outcome = session.search("  ").await;
        assert!(outcome.results().unwrap().is_empty());
        assert_eq!(session.loader().stats().fetches(), 0);
    }

    #[tokio::test]
    async fn shards_are_loaded_once_across_queries() {
        let output = build();
        let session = session(&output);
        session.search("ca").await;
        session.search("can").await;
        session.search("capture").await;
        let metrics = session.metrics();
        assert_eq!(metrics.search_queries, 3);
        assert_eq!(metrics.cache_misses, 1);
        assert_eq!(metrics.cache_hits, 2);
    }

    #[tokio::test]
    async fn missing_shard_degrades_instead_of_failing() {
        let output = build();
        let c = output.manifest.resolve_partitions("c").into_iter().next().unwrap();
        let id = output.manifest.entry(&c).unwrap().shard.clone();
        let session = SearchSession::new(
            Arc::new(output.manifest.clone()),
            MemoryShardSource::from_build(&output).without(&id),
            SearchConfig::default(),
        );

        let results = session.search("ca").await.into_results().unwrap();
        assert!(results.is_empty());
        assert_eq!(results.degraded, vec![c]);

        let fen = session.search("fen").await.into_results().unwrap();
        assert!(!fen.is_degraded());
        assert_eq!(fen.item_count(), 2);
        assert_eq!(session.metrics().shard_load_failures, 1);
    }

    #[tokio::test]
    async fn slow_earlier_query_is_discarded_as_stale() {
        let output = build();
        let c = output.manifest.resolve_partitions("c").into_iter().next().unwrap();
        let gated_shard = output.manifest.entry(&c).unwrap().shard.clone();
        let gate = Arc::new(Notify::new());
        let session = SearchSession::new(
            Arc::new(output.manifest.clone()),
            GatedSource {
                inner: MemoryShardSource::from_build(&output),
                gated_shard,
                gate: Arc::clone(&gate),
            },
            SearchConfig::default(),
        );

        let (first, second, ()) = tokio::join!(session.search("ca"), session.search("fen"), async {
            gate.notify_one();
        });

        assert!(first.is_stale());
        assert_eq!(first.generation(), 1);
        let second = second.into_results().unwrap();
        assert_eq!(second.generation, 2);
        assert_eq!(second.query, "fen");
        assert_eq!(session.metrics().stale_discarded, 1);
    }
}
