//! Index layer: shard and manifest formats plus the build-time index builder.

pub mod builder;
pub mod export;
pub mod manifest;
pub mod shard;

pub use builder::{BuildOutput, IndexBuilder};
pub use manifest::{key_alphabet, IndexManifest, ManifestEntry, PartitionKey};
pub use shard::{Shard, ShardReader};
