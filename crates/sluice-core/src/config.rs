//! Runtime configuration.
//!
//! Every field carries a default so an empty document is a valid config.

use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error as ThisError;

///
/// CONSTANTS
///

/// Page size applied by repository read paths when the caller sets none.
pub const DEFAULT_FALLBACK_PAGE_SIZE: u64 = 10;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

///
/// CountMode
///
/// How an unhydrated, criteria-backed collection answers `count()`.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CountMode {
    /// Wrap the select in `SELECT COUNT(*) FROM (…)`; no hydration.
    #[default]
    Subquery,

    /// Hydrate the collection and count in memory.
    Hydrate,
}

///
/// SluiceConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SluiceConfig {
    /// Prefix prepended to physical table names in the FROM clause.
    pub table_prefix: String,

    pub select_distinct: bool,

    pub fallback_page_size: u64,

    pub count_mode: CountMode,
}

impl SluiceConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml_str(&source)
    }

    #[must_use]
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    #[must_use]
    pub const fn with_count_mode(mut self, mode: CountMode) -> Self {
        self.count_mode = mode;
        self
    }
}

impl Default for SluiceConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            select_distinct: true,
            fallback_page_size: DEFAULT_FALLBACK_PAGE_SIZE,
            count_mode: CountMode::default(),
        }
    }
}
