//! Configuration
//!
//! Layered with the `config` crate. Precedence, lowest first: built-in
//! defaults, an optional TOML file, then `ARBOR__SECTION__KEY` environment
//! variables.

use crate::logging::LoggingConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArborConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

/// Local storage scanning options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Follow symbolic links while scanning
    pub follow_links: bool,

    /// Deepest directory level to load below the root (unbounded when unset)
    pub max_depth: Option<usize>,

    /// Relative paths matching any of these are skipped, see
    /// [`matches_ignore_pattern`](crate::storage::matches_ignore_pattern)
    pub ignore_patterns: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            follow_links: false,
            max_depth: None,
            ignore_patterns: vec![".git".to_string()],
        }
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults, `file` (if given) and the environment
    pub fn load(file: Option<&Path>) -> Result<ArborConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        let builder = Self::add_environment(builder);

        builder.build()?.try_deserialize()
    }

    /// Create default configuration.
    pub fn default() -> ArborConfig {
        ArborConfig::default()
    }

    fn add_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
        builder.add_source(
            Environment::with_prefix("ARBOR")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("storage.ignore_patterns"),
        )
    }
}
