//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the backend URL, the last active user and the cache
//! policy knobs.
//!
//! Configuration is stored at `~/.config/agora/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::models::{DEFAULT_MAX_DEPTH, ROOT_TAG_ID};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "agora";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Cached rows older than this are eligible for eviction.
const DEFAULT_STALE_WINDOW_HOURS: i64 = 24;

/// How often the HTTP reachability check runs.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub last_user_id: Option<String>,
    pub stale_window_hours: Option<i64>,
    pub root_tag_id: Option<String>,
    pub max_tag_depth: Option<usize>,
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub offline_mode: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn blob_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("blobs"))
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(
            self.poll_interval_secs
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
                .max(1),
        )
    }

    pub fn sync_settings(&self) -> SyncSettings {
        let defaults = SyncSettings::default();
        SyncSettings {
            stale_window: self
                .stale_window_hours
                .map(Duration::hours)
                .unwrap_or(defaults.stale_window),
            root_tag_id: self.root_tag_id.clone().unwrap_or(defaults.root_tag_id),
            max_tag_depth: self.max_tag_depth.unwrap_or(defaults.max_tag_depth),
        }
    }
}

/// Cache and navigation policy used by the `Repository` and `TagNavigator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub stale_window: Duration,
    pub root_tag_id: String,
    pub max_tag_depth: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            stale_window: Duration::hours(DEFAULT_STALE_WINDOW_HOURS),
            root_tag_id: ROOT_TAG_ID.to_string(),
            max_tag_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_settings_defaults() {
        let settings = Config::default().sync_settings();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.stale_window, Duration::hours(24));
        assert_eq!(settings.max_tag_depth, 2);
    }

    #[test]
    fn test_sync_settings_overrides() {
        let config = Config {
            stale_window_hours: Some(2),
            root_tag_id: Some("campus".to_string()),
            max_tag_depth: Some(4),
            ..Default::default()
        };
        let settings = config.sync_settings();
        assert_eq!(settings.stale_window, Duration::hours(2));
        assert_eq!(settings.root_tag_id, "campus");
        assert_eq!(settings.max_tag_depth, 4);
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let config = Config {
            poll_interval_secs: Some(0),
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_config_roundtrips_missing_fields() {
        let config: Config = serde_json::from_str(r#"{"backend_url":"https://x"}"#).unwrap();
        assert_eq!(config.backend_url.as_deref(), Some("https://x"));
        assert!(!config.offline_mode);
    }
}
