//! symshard: sharded symbol search for generated API documentation.
//!
//! Builds a prefix-partitioned symbol index from C/C++ sources or a site's
//! navigation tree, and serves case-insensitive, grouped, overload-aware
//! search over it while loading only the shards a query needs.

pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod indexer;
pub mod observability;
pub mod search;
pub mod types;
