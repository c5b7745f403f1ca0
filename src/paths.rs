//! Application path management for portable and installed modes.
//!
//! - **Portable mode**: a `.portable` marker next to the executable keeps the
//!   config, the sled database and the logs in that directory.
//! - **Installed mode** (default): data lives in the platform data directory
//!   (`%APPDATA%\Shared Store`, `~/.local/share/Shared Store`, ...).
//!
//! An explicit `--config` path overrides the detected config location only;
//! state and logs still follow the detected mode.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "Shared Store";

/// Default configuration file name
pub const CONFIG_FILE: &str = "shared-store.yaml";

/// Application paths for config, state, and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Path to the state directory (sled database)
    pub state_dir: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether running in portable mode (data next to exe)
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        if exe_dir.join(".portable").exists() {
            return Self::portable(&exe_dir);
        }

        let app_data = dirs::data_dir().unwrap_or(exe_dir).join(APP_NAME);
        Self {
            config: app_data.join(CONFIG_FILE),
            state_dir: app_data.join("state"),
            logs_dir: app_data.join("logs"),
            is_portable: false,
        }
    }

    /// Keep everything under `base`
    pub fn portable(base: &Path) -> Self {
        Self {
            config: base.join(CONFIG_FILE),
            state_dir: base.join(".state"),
            logs_dir: base.join("logs"),
            is_portable: true,
        }
    }

    /// Replace the config file location
    pub fn with_config(mut self, config: impl Into<PathBuf>) -> Self {
        self.config = config.into();
        self
    }

    /// Ensure the state and logs directories exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [&self.state_dir, &self.logs_dir] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Get the sled database path (within state_dir)
    pub fn sled_db_path(&self) -> PathBuf {
        self.state_dir.join("sled")
    }
}
