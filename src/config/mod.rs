//! Configuration management for tpo

pub mod schema;

pub use schema::Config;

use crate::cache::{GlobalCache, LocalCache};
use crate::deps::{Materializer, Registry};
use crate::error::{TpoError, TpoResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tpo")
            .join("config.toml")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> TpoResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> TpoResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| TpoError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| TpoError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> TpoResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            TpoError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> TpoResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TpoError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Local cache root for a project
    pub fn local_root(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.local.dir_name)
    }

    /// Local cache for a project; the root is created on first use
    pub fn local_cache(&self, project_dir: &Path) -> LocalCache {
        LocalCache::open(self.local_root(project_dir))
    }

    /// Global cache root: configured, or `~/.tpo_global`
    pub fn global_root(&self) -> TpoResult<PathBuf> {
        match &self.global.root {
            Some(root) => Ok(root.clone()),
            None => GlobalCache::default_root(),
        }
    }

    /// Global cache with the configured timeouts
    pub fn global_cache(&self) -> TpoResult<GlobalCache> {
        Ok(GlobalCache::new(self.global_root()?)
            .with_lock_timeout(self.global.lock_timeout())
            .with_cleanup_timeout(self.global.cleanup_lock_timeout()))
    }

    /// Built-in registry with the configured mappings layered on top
    pub fn registry(&self) -> Registry {
        Registry::builtin().with_overrides(&self.deps.libraries, &self.deps.platforms)
    }

    /// Materializer over the configured global cache and registry
    pub fn materializer(&self) -> TpoResult<Materializer> {
        Ok(Materializer::new(self.global_cache()?, self.registry())
            .with_branches(self.global.branches.clone()))
    }
}
