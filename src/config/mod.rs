//! Configuration management for Shared Store
//!
//! Handles loading, validating and saving the YAML configuration file and
//! opening the storage backend it describes.

use crate::paths::AppPaths;
use crate::storage::{MemoryStorage, SledStorage, Storage};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Durable storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Database directory for the sled backend (defaults to the app state dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default = "default_true")]
    pub flush_on_write: bool,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sled,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Also write a daily log file into the logs directory
    #[serde(default)]
    pub file: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            flush_on_write: default_true(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file doesn't exist
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.storage.path {
            if path.trim().is_empty() {
                anyhow::bail!("storage.path cannot be empty");
            }
            if self.storage.backend == StorageBackend::Memory {
                anyhow::bail!("storage.path is only valid with the sled backend");
            }
        }

        if let Some(level) = self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            if !matches!(level, "error" | "warn" | "info" | "debug" | "trace") {
                anyhow::bail!(
                    "logging.level '{}' is invalid (expected error, warn, info, debug or trace)",
                    level
                );
            }
        }

        Ok(())
    }

    /// Resolve the sled database directory
    pub fn sled_path(&self, paths: &AppPaths) -> PathBuf {
        self.storage
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| paths.sled_db_path())
    }

    /// Open the configured storage backend
    pub fn open_storage(&self, paths: &AppPaths) -> Result<Arc<dyn Storage>> {
        match self.storage.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage (values are lost on exit)");
                Ok(Arc::new(MemoryStorage::new()))
            }
            StorageBackend::Sled => {
                let path = self.sled_path(paths);
                let storage = SledStorage::open(&path, self.storage.flush_on_write)
                    .with_context(|| format!("Failed to open sled storage at: {}", path.display()))?;
                Ok(Arc::new(storage))
            }
        }
    }
}

// Default value functions
fn default_backend() -> StorageBackend { StorageBackend::Sled }
fn default_true() -> bool { true }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_paths(dir: &Path) -> AppPaths {
        AppPaths {
            config: dir.join("config.yaml"),
            state_dir: dir.join(".state"),
            logs_dir: dir.join("logs"),
            is_portable: true,
        }
    }

    #[tokio::test]
    async fn test_load_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");

        let yaml = r#"
storage:
  backend: memory
  flush_on_write: false

logging:
  level: debug
"#;
        std::fs::write(&config_path, yaml)?;

        let config = AppConfig::load(&config_path).await?;
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(!config.storage.flush_on_write);
        assert_eq!(
            config.logging.as_ref().and_then(|l| l.level.as_deref()),
            Some("debug")
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = AppConfig::load_or_default(temp_dir.path().join("absent.yaml")).await?;

        assert_eq!(config.storage.backend, StorageBackend::Sled);
        assert!(config.storage.flush_on_write);
        assert!(config.logging.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_and_reload() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");

        let mut config = AppConfig::default();
        config.storage.path = Some("/tmp/shared-store-db".to_string());
        config.save(&config_path).await?;

        let reloaded = AppConfig::load(&config_path).await?;
        assert_eq!(reloaded.storage.path.as_deref(), Some("/tmp/shared-store-db"));
        Ok(())
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.storage.path = Some("db".to_string());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging = Some(LoggingConfig {
            level: Some("loud".to_string()),
            file: false,
        });
        assert!(config.validate().is_err());

        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_open_sled_storage_in_state_dir() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let paths = test_paths(temp_dir.path());
        let config = AppConfig::default();

        assert_eq!(config.sled_path(&paths), temp_dir.path().join(".state").join("sled"));

        let storage = config.open_storage(&paths)?;
        storage.set("k", "v")?;
        assert_eq!(storage.get("k")?.as_deref(), Some("v"));
        Ok(())
    }
}
