use crate::EvictionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for crate::ArchLensError {
    fn from(err: ConfigError) -> Self {
        crate::ArchLensError::Config(err.to_string())
    }
}

/// Main configuration for the analysis engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArchLensConfig {
    /// Entity and query cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Worker pool and run settings
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Per-component analysis results
    #[serde(default = "default_entity_cache")]
    pub entity: CacheSection,

    /// Query results keyed by normalized query string
    #[serde(default = "default_query_cache")]
    pub query: CacheSection,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            entity: default_entity_cache(),
            query: default_query_cache(),
        }
    }
}

/// Ceilings and expiry for one cache instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSection {
    /// Maximum number of entries
    pub max_size: usize,

    /// Seconds after which an entry is stale
    pub ttl_secs: u64,

    /// "lru", "fifo" or "lfu"
    #[serde(default)]
    pub eviction_policy: EvictionPolicy,

    /// Estimated memory ceiling in bytes
    pub memory_threshold_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Number of workers in the pool
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Optional deadline for a whole scheduling run
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            run_timeout_secs: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_entity_cache() -> CacheSection {
    CacheSection {
        max_size: 500,
        ttl_secs: 300,
        eviction_policy: EvictionPolicy::Lru,
        memory_threshold_bytes: 16 * 1024 * 1024,
    }
}
fn default_query_cache() -> CacheSection {
    CacheSection {
        max_size: 200,
        ttl_secs: 120,
        eviction_policy: EvictionPolicy::Lru,
        memory_threshold_bytes: 8 * 1024 * 1024,
    }
}
fn default_worker_count() -> usize {
    num_cpus::get().max(1)
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Loads configuration with precedence env > local file > user file > defaults.
pub struct ConfigManager {
    config: ArchLensConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (`ARCHLENS_*`, `RUST_LOG`)
    /// 2. Config file (`./.archlens.toml`)
    /// 3. User config (`~/.archlens/config.toml`)
    /// 4. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let (config, config_path) = Self::load_config_file()?;
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        info!(
            config_file = ?config_path,
            workers = config.scheduler.worker_count,
            entity_policy = %config.cache.entity.eviction_policy,
            query_policy = %config.cache.query.eviction_policy,
            "configuration loaded"
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load a specific file, still applying env overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let config = Self::apply_env_overrides(Self::read_toml_file(path)?);
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    fn load_config_file() -> Result<(ArchLensConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".archlens.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".archlens").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        debug!("no config file found, using defaults");
        Ok((ArchLensConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<ArchLensConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(config: ArchLensConfig) -> ArchLensConfig {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(mut config: ArchLensConfig, lookup: F) -> ArchLensConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        for (prefix, section) in [
            ("ARCHLENS_ENTITY_CACHE", &mut config.cache.entity),
            ("ARCHLENS_QUERY_CACHE", &mut config.cache.query),
        ] {
            if let Some(size) = lookup(&format!("{}_MAX_SIZE", prefix)).and_then(|v| v.parse().ok())
            {
                section.max_size = size;
            }
            if let Some(ttl) = lookup(&format!("{}_TTL_SECS", prefix)).and_then(|v| v.parse().ok()) {
                section.ttl_secs = ttl;
            }
            if let Some(policy) =
                lookup(&format!("{}_POLICY", prefix)).and_then(|v| v.parse().ok())
            {
                section.eviction_policy = policy;
            }
            if let Some(bytes) =
                lookup(&format!("{}_MEMORY_BYTES", prefix)).and_then(|v| v.parse().ok())
            {
                section.memory_threshold_bytes = bytes;
            }
        }

        if let Some(workers) = lookup("ARCHLENS_WORKER_COUNT").and_then(|v| v.parse().ok()) {
            config.scheduler.worker_count = workers;
        }
        if let Some(secs) = lookup("ARCHLENS_RUN_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.scheduler.run_timeout_secs = Some(secs);
        }

        if let Some(level) = lookup("RUST_LOG") {
            config.logging.level = level;
        }
        if let Some(format) = lookup("ARCHLENS_LOG_FORMAT") {
            config.logging.format = format;
        }

        config
    }

    pub fn validate_config(config: &ArchLensConfig) -> Result<(), ConfigError> {
        for (name, section) in [
            ("cache.entity", &config.cache.entity),
            ("cache.query", &config.cache.query),
        ] {
            if section.max_size == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{}.max_size must be greater than zero",
                    name
                )));
            }
            if section.memory_threshold_bytes == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{}.memory_threshold_bytes must be greater than zero",
                    name
                )));
            }
        }

        if config.scheduler.worker_count == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.worker_count must be greater than zero".to_string(),
            ));
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        Ok(())
    }

    pub fn config(&self) -> &ArchLensConfig {
        &self.config
    }

    pub fn into_config(self) -> ArchLensConfig {
        self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Write the default configuration to `path`, creating parent directories.
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = ArchLensConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}
