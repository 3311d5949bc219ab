//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! API base URL, the session TTL and revalidation cadence, and the data
//! directory backing persistent storage.
//!
//! Configuration is stored at `~/.config/coursecache/config.json`; a
//! `.env` file and the `COURSECACHE_API_URL` environment variable can
//! override the API endpoint.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "coursecache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default API endpoint, matching the development server.
const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api/v1";

/// Default session lifetime in hours.
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Default seconds between background session checks.
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 5 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub session_ttl_hours: i64,
    pub session_check_interval_secs: u64,
    /// Overrides the platform data directory when set.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            session_check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            data_dir: None,
        }
    }
}

impl Config {
    /// Load the config file, falling back to defaults when absent. A
    /// `.env` file is read first so `COURSECACHE_API_URL` can override the
    /// endpoint either way.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Ok(url) = std::env::var("COURSECACHE_API_URL") {
            config.api_base_url = url;
        }

        Ok(config)
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

    /// Directory backing the persistent key-value storage.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }

    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_check_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.session_ttl(), chrono::Duration::hours(24));
        assert_eq!(config.check_interval(), std::time::Duration::from_secs(300));
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let config = Config {
            data_dir: Some(PathBuf::from("/tmp/coursecache-test")),
            ..Default::default()
        };
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/coursecache-test"));
    }
}
