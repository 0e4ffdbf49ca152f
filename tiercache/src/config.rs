use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{CacheError, Result};

/// Main cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL applied when a caller does not pass one
    pub default_ttl_ms: u64,
    /// Fraction of an entry's TTL after which it is considered stale
    pub stale_ratio: f64,
    /// Interval of the background expiry sweep, 0 disables it
    pub cleanup_interval_ms: u64,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Durable tier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Per-origin directory used by the file backend
    pub directory: PathBuf,
    pub quota_mb: u64,
    /// Prepended to every physical key
    pub global_prefix: String,
    /// Physical key holding the JSON index of written keys
    pub index_key: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One file per entry under `directory`
    #[default]
    File,
    /// In-process medium, lost on exit
    Memory,
    /// Volatile-only operation
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 300_000,
            stale_ratio: 0.5,
            cleanup_interval_ms: 60_000,
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            directory: PathBuf::from("./data/cache"),
            quota_mb: 5,
            global_prefix: "cache_".to_string(),
            index_key: "cache-index".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: CacheConfig = serde_yaml::from_str(&content)
            .map_err(|e| CacheError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the cache cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl_ms == 0 {
            return Err(CacheError::InvalidTtl(
                "default_ttl_ms must be greater than zero".to_string(),
            ));
        }
        if !(self.stale_ratio > 0.0 && self.stale_ratio <= 1.0) {
            return Err(CacheError::InvalidConfig(format!(
                "stale_ratio must be in (0, 1], got {}",
                self.stale_ratio
            )));
        }
        if self.storage.global_prefix.is_empty() || self.storage.index_key.is_empty() {
            return Err(CacheError::InvalidConfig(
                "global_prefix and index_key must not be empty".to_string(),
            ));
        }
        if self.storage.index_key.starts_with(&self.storage.global_prefix) {
            return Err(CacheError::InvalidConfig(format!(
                "index_key '{}' collides with global_prefix '{}'",
                self.storage.index_key, self.storage.global_prefix
            )));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn quota_bytes(&self) -> u64 {
        self.storage.quota_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_is_valid() {
        CacheConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = CacheConfig::default();
        config.default_ttl_ms = 0;
        assert!(matches!(config.validate(), Err(CacheError::InvalidTtl(_))));
    }

    #[test]
    fn test_stale_ratio_bounds() {
        let mut config = CacheConfig::default();
        config.stale_ratio = 0.0;
        assert!(config.validate().is_err());
        config.stale_ratio = 1.5;
        assert!(config.validate().is_err());
        config.stale_ratio = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_index_key_must_not_look_like_entry() {
        let mut config = CacheConfig::default();
        config.storage.index_key = "cache_index".to_string();
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_file_partial_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.yml");
        fs::write(
            &path,
            "default_ttl_ms: 1000\nstorage:\n  backend: memory\n  quota_mb: 1\nlogging:\n  format: json\n",
        )
        .unwrap();

        let config = CacheConfig::from_file(&path).unwrap();
        assert_eq!(config.default_ttl(), Duration::from_secs(1));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.quota_bytes(), 1024 * 1024);
        assert_eq!(config.storage.global_prefix, "cache_");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }
}
