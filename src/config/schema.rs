//! Configuration schema for tpo
//!
//! Configuration is stored at `~/.config/tpo/config.toml`

use crate::constants::{
    CLEANUP_LOCK_TIMEOUT, DEFAULT_BRANCHES, GLOBAL_LOCK_TIMEOUT, LOCAL_CACHE_DIR,
    LOCAL_LOCK_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Local (per-project) cache settings
    pub local: LocalConfig,

    /// Global (per-user) artifact cache settings
    pub global: GlobalConfig,

    /// Dependency name mappings
    pub deps: DepsConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Local cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Cache directory name inside the project
    pub dir_name: String,

    /// Entries kept by `cache gc`
    pub max_entries: usize,

    /// Entries older than this are removed by `cache gc`
    pub max_age_days: u32,

    /// Seconds to wait for an entry lock
    pub lock_timeout_secs: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            dir_name: LOCAL_CACHE_DIR.to_string(),
            max_entries: 10,
            max_age_days: 30,
            lock_timeout_secs: LOCAL_LOCK_TIMEOUT.as_secs(),
        }
    }
}

impl LocalConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

/// Global cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Cache root (default: ~/.tpo_global)
    pub root: Option<PathBuf>,

    /// Artifacts kept per repository by `global clean`
    pub keep_recent: usize,

    /// Seconds to wait for an artifact lock while fetching
    pub lock_timeout_secs: u64,

    /// Seconds to wait for an artifact lock during cleanup
    pub cleanup_lock_timeout_secs: u64,

    /// Branches tried, in order, when fetching
    pub branches: Vec<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            root: None,
            keep_recent: 5,
            lock_timeout_secs: GLOBAL_LOCK_TIMEOUT.as_secs(),
            cleanup_lock_timeout_secs: CLEANUP_LOCK_TIMEOUT.as_secs(),
            branches: DEFAULT_BRANCHES.iter().map(|b| b.to_string()).collect(),
        }
    }
}

impl GlobalConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn cleanup_lock_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_lock_timeout_secs)
    }
}

/// Extra name mappings layered over the built-in registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DepsConfig {
    /// Library name to `owner/repo` or URL
    pub libraries: HashMap<String, String>,

    /// Platform name to `owner/repo` or URL
    pub platforms: HashMap<String, String>,
}
