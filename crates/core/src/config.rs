//! Configuration via `docrow.toml`
//!
//! Everything has a default, so an empty file (or no file) is valid.
//!
//! ```toml
//! [iterator]
//! verify_key_order = true
//!
//! [store]
//! teardown_timeout_ms = 5000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DocDbError, DocResult};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "docrow.toml";

/// Row iterator settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IteratorConfig {
    /// Treat a physical key that does not sort after its predecessor as
    /// store corruption and fail the scan.
    #[serde(default = "default_verify_key_order")]
    pub verify_key_order: bool,
}

fn default_verify_key_order() -> bool {
    true
}

impl Default for IteratorConfig {
    fn default() -> Self {
        IteratorConfig {
            verify_key_order: default_verify_key_order(),
        }
    }
}

/// Store lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// How long teardown waits for outstanding lifetime guards
    #[serde(default = "default_teardown_timeout_ms")]
    pub teardown_timeout_ms: u64,
}

fn default_teardown_timeout_ms() -> u64 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            teardown_timeout_ms: default_teardown_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Teardown timeout as a `Duration`
    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }
}

/// Top-level configuration loaded from `docrow.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocDbConfig {
    /// Row iterator settings
    #[serde(default)]
    pub iterator: IteratorConfig,
    /// Store lifecycle settings
    #[serde(default)]
    pub store: StoreConfig,
}

impl DocDbConfig {
    /// Parse config from TOML text
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the text is not valid TOML for this schema.
    pub fn from_toml_str(content: &str) -> DocResult<Self> {
        toml::from_str(content)
            .map_err(|e| DocDbError::InvalidConfig(format!("Failed to parse config: {}", e)))
    }

    /// Read and parse config from a file path
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> DocResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DocDbError::InvalidConfig(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> DocResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DocDbError::InvalidConfig(format!("Failed to serialize config: {}", e)))
    }
}
