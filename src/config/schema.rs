//! Configuration data structures for symshard.
//!
//! Defines the YAML config format: index-builder partitioning knobs and
//! search-runtime display limits. Every field has a default so an empty
//! file (or no file) is a valid config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, SymshardError};
use crate::types::CategoryGroup;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for symshard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymshardConfig {
    /// Config format version (currently "1.0").
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub builder: BuilderConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Default for SymshardConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            builder: BuilderConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl SymshardConfig {
    pub fn validate(&self) -> Result<()> {
        self.builder.validate()?;
        self.search.validate()
    }
}

// ---------------------------------------------------------------------------
// BuilderConfig
// ---------------------------------------------------------------------------

/// Partitioning policy of the index builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Leading key characters that form a first-level bucket.
    #[serde(default = "default_prefix_len")]
    pub prefix_len: usize,

    /// A bucket with more entries than this is split by category group.
    #[serde(default = "default_max_shard_entries")]
    pub max_shard_entries: usize,

    /// Also write Doxygen-style `searchdata/*.js` shards.
    #[serde(default)]
    pub export_js: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            prefix_len: default_prefix_len(),
            max_shard_entries: default_max_shard_entries(),
            export_js: false,
        }
    }
}

impl BuilderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.prefix_len == 0 {
            return Err(SymshardError::Config("builder.prefix_len must be >= 1".into()));
        }
        if self.max_shard_entries == 0 {
            return Err(SymshardError::Config(
                "builder.max_shard_entries must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SearchConfig
// ---------------------------------------------------------------------------

/// Search-runtime behaviour and display limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum items shown per display group unless overridden.
    #[serde(default = "default_group_cap")]
    pub default_group_cap: usize,

    /// Per-group caps, keyed by group name (`functions`, `classes`, ...).
    #[serde(default)]
    pub group_caps: HashMap<CategoryGroup, usize>,

    /// Prefix prepended to every location when rendering links.
    #[serde(default = "default_site_base")]
    pub site_base: String,

    /// Include keys that contain the query past their first character. Also
    /// widens routing to every shard whose key alphabet covers the query.
    #[serde(default = "default_true")]
    pub substring_matches: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_group_cap: default_group_cap(),
            group_caps: HashMap::new(),
            site_base: default_site_base(),
            substring_matches: true,
        }
    }
}

impl SearchConfig {
    /// Cap for one display group.
    pub fn cap_for(&self, group: CategoryGroup) -> usize {
        self.group_caps
            .get(&group)
            .copied()
            .unwrap_or(self.default_group_cap)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_group_cap == 0 {
            return Err(SymshardError::Config(
                "search.default_group_cap must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_version() -> String {
    "1.0".to_string()
}

fn default_prefix_len() -> usize {
    1
}

fn default_max_shard_entries() -> usize {
    256
}

fn default_group_cap() -> usize {
    50
}

fn default_site_base() -> String {
    "../".to_string()
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_default_config() {
        let config = SymshardConfig::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.builder.prefix_len, 1);
        assert_eq!(config.builder.max_shard_entries, 256);
        assert!(!config.builder.export_js);
        assert_eq!(config.search.default_group_cap, 50);
        assert_eq!(config.search.site_base, "../");
        assert!(config.search.substring_matches);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: SymshardConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, SymshardConfig::default());
    }

    #[test]
    fn test_full_yaml_config() {
        let yaml = r#"
version: "1.0"
builder:
  prefix_len: 2
  max_shard_entries: 64
  export_js: true
search:
  default_group_cap: 10
  group_caps:
    functions: 25
    pages: 3
  site_base: ""
  substring_matches: false
"#;
        let config: SymshardConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.builder.prefix_len, 2);
        assert_eq!(config.builder.max_shard_entries, 64);
        assert!(config.builder.export_js);
        assert_eq!(config.search.cap_for(CategoryGroup::Functions), 25);
        assert_eq!(config.search.cap_for(CategoryGroup::Pages), 3);
        assert_eq!(config.search.cap_for(CategoryGroup::Classes), 10);
        assert_eq!(config.search.site_base, "");
        assert!(!config.search.substring_matches);
    }

    #[test]
    fn test_unknown_group_cap_is_an_error() {
        let yaml = "search:\n  group_caps:\n    widgets: 3\n";
        assert!(serde_yaml::from_str::<SymshardConfig>(yaml).is_err());
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let result: std::result::Result<SymshardConfig, _> = serde_yaml::from_str("{{invalid yaml}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_values_fail_validation() {
        let mut config = SymshardConfig::default();
        config.builder.max_shard_entries = 0;
        assert!(config.validate().is_err());

        let mut config = SymshardConfig::default();
        config.search.default_group_cap = 0;
        assert!(config.validate().is_err());
    }

    proptest! {
        #[test]
        fn config_yaml_roundtrip_proptest(prefix_len in 1usize..4, max in 1usize..10_000, cap in 1usize..500) {
            let mut config = SymshardConfig::default();
            config.builder.prefix_len = prefix_len;
            config.builder.max_shard_entries = max;
            config.search.default_group_cap = cap;
            let yaml = serde_yaml::to_string(&config).unwrap();
            let back: SymshardConfig = serde_yaml::from_str(&yaml).unwrap();
            prop_assert_eq!(back, config);
        }
    }
}
