//! Configuration loading.
//!
//! Sources, highest priority first:
//! 1. `SYMSHARD_MAX_SHARD_ENTRIES` / `SYMSHARD_GROUP_CAP` environment variables
//! 2. an explicit `--config` path
//! 3. `./symshard.yaml`
//! 4. `<user config dir>/symshard/symshard.yaml`
//! 5. built-in defaults

pub mod schema;

use std::path::{Path, PathBuf};

pub use schema::{BuilderConfig, SearchConfig, SymshardConfig};

use crate::error::{Result, SymshardError};

/// Config file name looked up in the working and user config directories.
pub const CONFIG_FILE: &str = "symshard.yaml";

const ENV_MAX_SHARD_ENTRIES: &str = "SYMSHARD_MAX_SHARD_ENTRIES";
const ENV_GROUP_CAP: &str = "SYMSHARD_GROUP_CAP";

/// Parse a config file.
pub fn load_file(path: &Path) -> Result<SymshardConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        SymshardError::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    let config: SymshardConfig = serde_yaml::from_str(&contents)?;
    Ok(config)
}

/// First config file that exists among the discovery locations.
pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    directories::ProjectDirs::from("", "", "symshard")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .filter(|p| p.is_file())
}

/// Resolve the effective config: discovered file, then environment overrides.
pub fn load(explicit: Option<&Path>) -> Result<SymshardConfig> {
    let mut config = match discover(explicit) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            load_file(&path)?
        }
        None => SymshardConfig::default(),
    };
    apply_env(&mut config, |name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env<F>(config: &mut SymshardConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_MAX_SHARD_ENTRIES) {
        config.builder.max_shard_entries = parse_env(ENV_MAX_SHARD_ENTRIES, &value)?;
    }
    if let Some(value) = lookup(ENV_GROUP_CAP) {
        config.search.default_group_cap = parse_env(ENV_GROUP_CAP, &value)?;
    }
    Ok(())
}

fn parse_env(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| SymshardError::Config(format!("{name} must be a positive integer, got `{value}`")))
}
