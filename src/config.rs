//! Application configuration
//!
//! Stored as `config.json` in the data directory. Every field has a default,
//! so a missing or partial file still loads.

use crate::core::storage::write_atomic;
use crate::utils::get_data_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Filter used when a CLI command omits the name
    pub active_filter: Option<String>,
    /// Directory the game client reads `.filter` files from
    pub game_directory: Option<PathBuf>,
    /// Maximum undo depth (0 = unbounded)
    pub history_limit: usize,
    /// Minimum interval between two writes of the filter file
    pub write_debounce_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            active_filter: None,
            game_directory: None,
            history_limit: 0,
            write_debounce_ms: 1000,
        }
    }
}

impl AppConfig {
    pub fn write_debounce(&self) -> Duration {
        Duration::from_millis(self.write_debounce_ms)
    }
}

/// Saves the config to `path` using an atomic write.
///
/// # Security
///
/// On Unix systems, the file is created with mode 0o600 (user read/write only).
pub async fn save_config_to(config: &AppConfig, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    if let Some(parent) = path.parent()
        && !tokio::fs::try_exists(parent).await?
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    write_atomic(path, &json).await
}

/// Loads the config from `path`, falling back to defaults.
///
/// An unreadable file is logged and ignored rather than failing startup.
pub async fn load_config_from(path: &Path) -> AppConfig {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => match serde_json::from_str::<AppConfig>(&json) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring invalid config {}: {e}", path.display());
                AppConfig::default()
            }
        },
        Err(_) => AppConfig::default(),
    }
}

/// Saves the app config to the data directory.
pub async fn save_config(config: &AppConfig) -> std::io::Result<()> {
    if let Some(mut path) = get_data_dir() {
        path.push(CONFIG_FILE);
        save_config_to(config, &path).await?;
    }
    Ok(())
}

/// Loads the app config from the data directory, or returns defaults.
pub async fn load_config() -> AppConfig {
    if let Some(mut path) = get_data_dir() {
        path.push(CONFIG_FILE);
        return load_config_from(&path).await;
    }
    AppConfig::default()
}
