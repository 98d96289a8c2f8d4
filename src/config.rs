//! Data-layer configuration.
//!
//! Configuration is read from TOML. Every field has a default, so an empty
//! file is a valid configuration:
//!
//! ```toml
//! id_field = "_id"
//! default_n = 100
//! fold_probability = 0.05
//!
//! [cdc]
//! running = false
//!
//! [searcher]
//! kind = "in_memory"
//! ```

use crate::error::{Error, Result};
use conflux_vector::{SearcherKind, DEFAULT_ID_FIELD, DEFAULT_N};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Change-data-capture settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdcConfig {
    /// Whether an external CDC service keeps searchers in sync
    pub running: bool,
}

/// Vector searcher settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearcherConfig {
    /// Searcher implementation for new vector indexes
    pub kind: SearcherKind,
}

/// Data-layer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document field holding the id
    pub id_field: String,
    /// Default number of neighbours for nearest searches
    pub default_n: usize,
    /// Chance that an inserted document lands in the `valid` fold
    pub fold_probability: f64,
    /// CDC settings
    pub cdc: CdcConfig,
    /// Searcher settings
    pub searcher: SearcherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id_field: DEFAULT_ID_FIELD.to_string(),
            default_n: DEFAULT_N,
            fold_probability: 0.05,
            cdc: CdcConfig::default(),
            searcher: SearcherConfig::default(),
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.id_field.is_empty() {
            return Err(Error::Config("id_field must not be empty".to_string()));
        }
        if self.default_n == 0 {
            return Err(Error::Config("default_n must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.fold_probability) {
            return Err(Error::Config(format!(
                "fold_probability must be within [0, 1], got {}",
                self.fold_probability
            )));
        }
        Ok(())
    }
}
