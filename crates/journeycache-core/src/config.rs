//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! backend URL, cache TTL, and the last logged-in user.
//!
//! Configuration is stored at `~/.config/journeycache/config.json`. The
//! `JOURNEYCACHE_API_URL` and `JOURNEYCACHE_CACHE_TTL_MINUTES` environment
//! variables take precedence over the file.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::DEFAULT_API_BASE_URL;
use crate::cache::DEFAULT_TTL_MINUTES;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "journeycache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_API_URL: &str = "JOURNEYCACHE_API_URL";
pub const ENV_CACHE_TTL_MINUTES: &str = "JOURNEYCACHE_CACHE_TTL_MINUTES";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub cache_ttl_minutes: Option<i64>,
    pub last_username: Option<String>,
    pub last_user_id: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        Ok(config.with_overrides(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_CACHE_TTL_MINUTES).ok(),
        ))
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

    /// Apply environment overrides. Unparseable TTL values are ignored.
    pub fn with_overrides(mut self, api_url: Option<String>, ttl_minutes: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = Some(url);
        }
        if let Some(raw) = ttl_minutes {
            match raw.trim().parse::<i64>() {
                Ok(minutes) if minutes >= 0 => self.cache_ttl_minutes = Some(minutes),
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_CACHE_TTL_MINUTES),
            }
        }
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::minutes(self.cache_ttl_minutes.unwrap_or(DEFAULT_TTL_MINUTES).max(0))
    }

    /// Root of all cached state; holds the session file and one directory per user
    pub fn cache_root(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
