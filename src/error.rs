//! Error types for symshard.
//!
//! Build-time defects in individual symbols are reported as
//! [`MalformedSymbolError`] diagnostics and never abort a build on their own.
//! Runtime shard failures are [`ShardLoadError`]s and degrade a search
//! instead of failing it.

use thiserror::Error;

/// A raw symbol the index builder refused to emit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed symbol `{name}` ({location:?}): {reason}")]
pub struct MalformedSymbolError {
    /// Name as it appeared in the input (may be empty).
    pub name: String,
    /// Location as it appeared in the input (may be empty).
    pub location: String,
    /// What was wrong with it.
    pub reason: String,
}

impl MalformedSymbolError {
    pub fn new(name: impl Into<String>, location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            reason: reason.into(),
        }
    }
}

/// A shard that could not be fetched or decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load shard `{shard}` for partition {partition}: {reason}")]
pub struct ShardLoadError {
    /// Partition the shard serves, in display form.
    pub partition: String,
    /// Shard resource identifier from the manifest.
    pub shard: String,
    pub reason: String,
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum SymshardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    MalformedSymbol(#[from] MalformedSymbolError),

    #[error(transparent)]
    ShardLoad(#[from] ShardLoadError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SymshardError>;
