//! Structured logging, metrics, and path safety.
//!
//! This module provides:
//! - [`init_logging`]: one-time structured logging setup with `RUST_LOG` support
//! - [`validate_path`]: keeps shard reads inside the index directory
//! - [`Metrics`]: build and search counters, serializable to JSON

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging with `RUST_LOG` environment variable support.
///
/// Defaults to `symshard=info` when `RUST_LOG` is not set. Logs go to stderr
/// so `search --json` output stays clean.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("symshard=info"));

    // try_init so double-init in tests doesn't panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Resolve `path` under `root`, refusing anything that escapes it.
///
/// Both sides are canonicalized, so the target must exist. Returns the
/// canonical path on success.
pub fn validate_path(path: &str, root: &Path) -> Result<PathBuf, String> {
    let requested = root.join(path);
    let canonical = requested
        .canonicalize()
        .map_err(|e| format!("Path not found: {}: {}", path, e))?;

    let root_canonical = root
        .canonicalize()
        .map_err(|e| format!("Invalid index root: {}", e))?;

    if !canonical.starts_with(&root_canonical) {
        return Err(format!(
            "Path traversal detected: {} escapes index root",
            path
        ));
    }

    Ok(canonical)
}

/// Build and search counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub build_duration_ms: Option<u64>,
    pub files_extracted: usize,
    pub symbols_indexed: usize,
    pub shards_written: usize,
    pub malformed_symbols: usize,
    pub search_queries: u64,
    pub stale_discarded: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub shard_load_failures: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "build_duration_ms": self.build_duration_ms,
            "files_extracted": self.files_extracted,
            "symbols_indexed": self.symbols_indexed,
            "shards_written": self.shards_written,
            "malformed_symbols": self.malformed_symbols,
            "search_queries": self.search_queries,
            "stale_discarded": self.stale_discarded,
            "cache_hits": self.cache_hits,
            "cache_misses": self.cache_misses,
            "shard_load_failures": self.shard_load_failures,
            "cache_hit_rate": self.cache_hit_rate(),
        })
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_logging_does_not_panic() {
        init_logging();
        init_logging();
    }

    // -- validate_path ------------------------------------------------------

    #[test]
    fn validate_path_accepts_shard_inside_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("shards")).unwrap();
        std::fs::write(tmp.path().join("shards/all_0.jsonl"), "").unwrap();

        let result = validate_path("shards/all_0.jsonl", tmp.path());
        assert!(result.unwrap().starts_with(tmp.path().canonicalize().unwrap()));
    }

    #[test]
    fn validate_path_rejects_traversal_attempt() {
        let tmp = TempDir::new().unwrap();
        let err = validate_path("../../../etc/passwd", tmp.path()).unwrap_err();
        assert!(
            err.contains("Path traversal") || err.contains("Path not found"),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn validate_path_rejects_absolute_path_outside_root() {
        let tmp = TempDir::new().unwrap();
        assert!(validate_path("/tmp", tmp.path()).is_err());
    }

    #[test]
    fn validate_path_rejects_missing_shard() {
        let tmp = TempDir::new().unwrap();
        let err = validate_path("shards/gone.jsonl", tmp.path()).unwrap_err();
        assert!(err.contains("Path not found"));
    }

    // -- Metrics ------------------------------------------------------------

    #[test]
    fn metrics_to_json_contains_all_fields() {
        let m = Metrics {
            build_duration_ms: Some(450),
            symbols_indexed: 500,
            shards_written: 12,
            search_queries: 10,
            stale_discarded: 2,
            cache_hits: 7,
            cache_misses: 3,
            ..Metrics::default()
        };

        let json = m.to_json();
        assert_eq!(json["build_duration_ms"], 450);
        assert_eq!(json["symbols_indexed"], 500);
        assert_eq!(json["shards_written"], 12);
        assert_eq!(json["search_queries"], 10);
        assert_eq!(json["stale_discarded"], 2);
        assert_eq!(json["cache_hits"], 7);
        assert_eq!(json["cache_misses"], 3);
        assert_eq!(json["shard_load_failures"], 0);
    }

    #[test]
    fn metrics_to_json_null_duration() {
        assert!(Metrics::new().to_json()["build_duration_ms"].is_null());
    }

    #[test]
    fn metrics_cache_hit_rate() {
        let m = Metrics {
            cache_hits: 7,
            cache_misses: 3,
            ..Metrics::default()
        };
        assert!((m.cache_hit_rate() - 0.7).abs() < f64::EPSILON);
        assert_eq!(Metrics::new().cache_hit_rate(), 0.0);
    }
}
